//! Capability registries: keyed collections of primitives, each descriptor
//! paired with the async function that serves it.
//!
//! Registries are plain values; the server wraps them in locks, snapshots
//! descriptors for listings and clones the dispatch functions out before
//! awaiting them.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use duplex_mcp_core::schema;
use duplex_mcp_core::types::{
    CallToolResult, GetPromptResponse, ReadResourceRequest, ReadResourceResponse,
};
use duplex_mcp_core::utils::{is_template, paginate, Cursor, UriTemplate};
use duplex_mcp_core::{McpError, McpResult, Prompt, Resource, ResourceTemplate, Tool};
use duplex_mcp_session::{CancellationToken, ProgressReporter};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Execution context handed to a tool function: the request's cancellation
/// scope and, when the caller asked for progress, a reporter bound to its
/// token.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub cancellation: CancellationToken,
    pub progress: Option<ProgressReporter>,
}

impl ToolContext {
    pub fn detached() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }
}

pub type ToolFn =
    Arc<dyn Fn(Option<Value>, ToolContext) -> BoxFuture<McpResult<CallToolResult>> + Send + Sync>;

pub type PromptFn = Arc<
    dyn Fn(Option<HashMap<String, String>>) -> BoxFuture<McpResult<GetPromptResponse>>
        + Send
        + Sync,
>;

pub type ResourceReadFn =
    Arc<dyn Fn(ReadResourceRequest) -> BoxFuture<McpResult<ReadResourceResponse>> + Send + Sync>;

pub type TemplateReadFn = Arc<
    dyn Fn(ReadResourceRequest, HashMap<String, String>) -> BoxFuture<McpResult<ReadResourceResponse>>
        + Send
        + Sync,
>;

struct ToolEntry {
    tool: Tool,
    dispatch: ToolFn,
}

/// Tools, keyed by name, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tool. The descriptor's schemas are validated.
    pub fn add(&mut self, tool: Tool, dispatch: ToolFn) -> McpResult<()> {
        tool.validate()?;
        match self.entries.iter_mut().find(|e| e.tool.name == tool.name) {
            Some(entry) => {
                entry.tool = tool;
                entry.dispatch = dispatch;
            }
            None => self.entries.push(ToolEntry { tool, dispatch }),
        }
        Ok(())
    }

    /// Add a tool whose input schema is derived from its argument type.
    pub fn add_typed<A, F, Fut>(&mut self, tool: Tool, handler: F) -> McpResult<()>
    where
        A: serde::de::DeserializeOwned + schemars::JsonSchema,
        F: Fn(A, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<CallToolResult>> + Send + 'static,
    {
        let tool = tool.with_input_schema(schema::schema_for::<A>()?);
        let dispatch: ToolFn = Arc::new(move |args, ctx| {
            let args = args.unwrap_or_else(|| Value::Object(Default::default()));
            match serde_json::from_value::<A>(args) {
                Ok(parsed) => Box::pin(handler(parsed, ctx)) as BoxFuture<_>,
                Err(err) => Box::pin(async move {
                    Err(McpError::invalid_params(format!("invalid tool arguments: {err}")))
                }) as BoxFuture<_>,
            }
        });
        self.add(tool, dispatch)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.tool.name != name);
        self.entries.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.entries.iter().map(|e| &e.tool).find(|t| t.name == name)
    }

    pub fn dispatch(&self, name: &str) -> Option<ToolFn> {
        self.entries
            .iter()
            .find(|e| e.tool.name == name)
            .map(|e| e.dispatch.clone())
    }

    pub fn descriptors(&self) -> Vec<Tool> {
        self.entries.iter().map(|e| e.tool.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct PromptEntry {
    prompt: Prompt,
    dispatch: PromptFn,
}

/// Prompts, keyed by name, in registration order.
#[derive(Default)]
pub struct PromptRegistry {
    entries: Vec<PromptEntry>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, prompt: Prompt, dispatch: PromptFn) {
        match self.entries.iter_mut().find(|e| e.prompt.name == prompt.name) {
            Some(entry) => {
                entry.prompt = prompt;
                entry.dispatch = dispatch;
            }
            None => self.entries.push(PromptEntry { prompt, dispatch }),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.prompt.name != name);
        self.entries.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&Prompt> {
        self.entries
            .iter()
            .map(|e| &e.prompt)
            .find(|p| p.name == name)
    }

    pub fn dispatch(&self, name: &str) -> Option<(Prompt, PromptFn)> {
        self.entries
            .iter()
            .find(|e| e.prompt.name == name)
            .map(|e| (e.prompt.clone(), e.dispatch.clone()))
    }

    pub fn descriptors(&self) -> Vec<Prompt> {
        self.entries.iter().map(|e| e.prompt.clone()).collect()
    }
}

struct ResourceEntry {
    resource: Resource,
    dispatch: ResourceReadFn,
}

struct TemplateEntry {
    descriptor: ResourceTemplate,
    template: UriTemplate,
    dispatch: TemplateReadFn,
}

/// Static resources and URI-template families, keyed by URI.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: Vec<ResourceEntry>,
    templates: Vec<TemplateEntry>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a static resource. A URI with template expressions
    /// belongs in [`ResourceRegistry::add_template`] instead.
    pub fn add_resource(&mut self, resource: Resource, dispatch: ResourceReadFn) -> McpResult<()> {
        if is_template(&resource.uri) {
            return Err(McpError::invalid_params(format!(
                "{} is a URI template, not a resource",
                resource.uri
            )));
        }
        match self
            .resources
            .iter_mut()
            .find(|e| e.resource.uri == resource.uri)
        {
            Some(entry) => {
                entry.resource = resource;
                entry.dispatch = dispatch;
            }
            None => self.resources.push(ResourceEntry { resource, dispatch }),
        }
        Ok(())
    }

    pub fn add_template(
        &mut self,
        descriptor: ResourceTemplate,
        dispatch: TemplateReadFn,
    ) -> McpResult<()> {
        let template = UriTemplate::parse(&descriptor.uri_template)?;
        match self
            .templates
            .iter_mut()
            .find(|e| e.descriptor.uri_template == descriptor.uri_template)
        {
            Some(entry) => {
                entry.descriptor = descriptor;
                entry.template = template;
                entry.dispatch = dispatch;
            }
            None => self.templates.push(TemplateEntry {
                descriptor,
                template,
                dispatch,
            }),
        }
        Ok(())
    }

    pub fn remove_resource(&mut self, uri: &str) -> bool {
        let before = self.resources.len();
        self.resources.retain(|e| e.resource.uri != uri);
        self.resources.len() != before
    }

    pub fn remove_template(&mut self, uri_template: &str) -> bool {
        let before = self.templates.len();
        self.templates
            .retain(|e| e.descriptor.uri_template != uri_template);
        self.templates.len() != before
    }

    /// Exact static match.
    pub fn read_dispatch(&self, uri: &str) -> Option<ResourceReadFn> {
        self.resources
            .iter()
            .find(|e| e.resource.uri == uri)
            .map(|e| e.dispatch.clone())
    }

    /// First template whose family contains the URI, in registration order.
    pub fn template_dispatch(
        &self,
        uri: &str,
    ) -> Option<(TemplateReadFn, HashMap<String, String>)> {
        self.templates
            .iter()
            .find_map(|e| e.template.matches(uri).map(|vars| (e.dispatch.clone(), vars)))
    }

    pub fn descriptors(&self) -> Vec<Resource> {
        self.resources.iter().map(|e| e.resource.clone()).collect()
    }

    pub fn template_descriptors(&self) -> Vec<ResourceTemplate> {
        self.templates.iter().map(|e| e.descriptor.clone()).collect()
    }
}

/// One page of a combined listing: registry items first, then the fallback
/// handler's items, with distinct cursor spaces and registry-wins
/// de-duplication by name.
pub(crate) async fn list_page<T, N, H>(
    statics: Vec<T>,
    cursor: Option<&str>,
    page_size: usize,
    name_of: N,
    handler_page: Option<H>,
) -> McpResult<(Vec<T>, Option<String>)>
where
    T: Clone,
    N: Fn(&T) -> &str,
    H: FnOnce(Option<String>) -> BoxFuture<McpResult<(Vec<T>, Option<String>)>>,
{
    let cursor = match cursor {
        None => Cursor::Static(0),
        Some(token) => {
            Cursor::decode(token).map_err(|err| McpError::invalid_params(err.to_string()))?
        }
    };

    match cursor {
        Cursor::Static(offset) => {
            let page = paginate(&statics, offset, page_size);
            if page.next_cursor.is_some() {
                return Ok((page.items, page.next_cursor));
            }
            // static space exhausted: splice in the handler's first page
            match handler_page {
                None => Ok((page.items, None)),
                Some(handler) => {
                    let (extra, handler_next) = handler(None).await?;
                    let taken: HashSet<String> =
                        statics.iter().map(|t| name_of(t).to_string()).collect();
                    let mut items = page.items;
                    items.extend(extra.into_iter().filter(|t| !taken.contains(name_of(t))));
                    Ok((items, handler_next.map(|c| Cursor::Handler(c).encode())))
                }
            }
        }
        Cursor::Handler(inner) => {
            let handler = handler_page
                .ok_or_else(|| McpError::invalid_params(format!("unknown cursor space: {inner}")))?;
            let (extra, handler_next) = handler(Some(inner)).await?;
            let taken: HashSet<String> = statics.iter().map(|t| name_of(t).to_string()).collect();
            let items: Vec<T> = extra
                .into_iter()
                .filter(|t| !taken.contains(name_of(t)))
                .collect();
            Ok((items, handler_next.map(|c| Cursor::Handler(c).encode())))
        }
    }
}
