//! Variable containers: the tagged-variant record the stack inspector and
//! evaluator expand through, `RemoteObject` → DAP `Variable` rendering, and
//! large-collection pagination.
//!
//! A dynamic-dispatch hierarchy would need one trait object per container
//! kind; a tagged variant with a shared `expand`/`set_value` pair avoids that
//! and keeps every variant's fields visible at the match site.

use js_dap_cdp::{CallArgument, CdpClient, CdpError, ObjectPreview, RemoteObject};
use js_dap_handles::HandleTable;
use js_dap_protocol::{Variable, VariablesFilter};

#[derive(Debug, thiserror::Error)]
pub enum VariablesError {
    #[error("variables reference does not point at a live container")]
    InvalidHandle,
    #[error("setValue is not supported for this variable")]
    SetValueNotSupported,
    #[error(transparent)]
    Cdp(#[from] CdpError),
}

/// A polymorphic record over what a `variablesReference` can point at.
/// Every variant exposes the same two operations through
/// [`VariableRegistry::expand`] and [`VariableRegistry::set_value`].
#[derive(Debug, Clone)]
pub enum VariableContainer {
    Scope {
        call_frame_id: String,
        scope_number: i64,
        object_id: Option<String>,
        this: Option<RemoteObject>,
        return_value: Option<RemoteObject>,
    },
    Property {
        object_id: String,
        evaluate_name: String,
    },
    LoggedObjects {
        objects: Vec<RemoteObject>,
    },
    Exception {
        object: RemoteObject,
    },
}

/// Holds every live [`VariableContainer`] behind a generation-stamped handle
/// table. Reset once per pause: stale handles from a prior pause are
/// invalid, never silently aliasing a new container.
pub struct VariableRegistry {
    containers: HandleTable<VariableContainer>,
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self { containers: HandleTable::new() }
    }
}

impl VariableRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, container: VariableContainer) -> i64 {
        self.containers.alloc(container)
    }

    #[must_use]
    pub fn get(&self, handle: i64) -> Option<&VariableContainer> {
        self.containers.get(handle)
    }

    /// Invalidates every handle minted so far. Call once per CDP `paused`.
    pub fn reset(&mut self) {
        self.containers.reset();
    }

    /// Expands a container into its child variables. `start`/`count` select
    /// the large-collection pagination path and imply `filter = Indexed`.
    pub async fn expand(
        &mut self,
        handle: i64,
        filter: Option<VariablesFilter>,
        start: Option<i64>,
        count: Option<i64>,
        cdp: &impl CdpClient,
    ) -> Result<Vec<Variable>, VariablesError> {
        let container = self.containers.get(handle).cloned().ok_or(VariablesError::InvalidHandle)?;

        let mut variables = Vec::new();
        let object_id = match &container {
            VariableContainer::Scope { object_id, this, return_value, .. } => {
                if let Some(this_obj) = this {
                    variables.push(self.render_child("this", None, this_obj.clone()));
                }
                if let Some(ret) = return_value {
                    variables.push(self.render_child("returnValue", None, ret.clone()));
                }
                object_id.clone()
            }
            VariableContainer::Property { object_id, .. } => Some(object_id.clone()),
            VariableContainer::Exception { object } => object.object_id.clone(),
            VariableContainer::LoggedObjects { objects } => {
                for (index, object) in objects.iter().enumerate() {
                    variables.push(self.render_child(&index.to_string(), None, object.clone()));
                }
                None
            }
        };

        let parent_prefix = match &container {
            VariableContainer::Property { evaluate_name, .. } => Some(evaluate_name.clone()),
            _ => None,
        };

        let Some(object_id) = object_id else {
            return Ok(apply_filter(variables, filter));
        };

        let mut expanded = if let (Some(start), Some(count)) = (start, count) {
            self.expand_paginated(&object_id, start, count, cdp).await?
        } else {
            self.expand_properties(&object_id, parent_prefix.as_deref(), cdp).await?
        };
        variables.append(&mut expanded);
        Ok(apply_filter(variables, filter))
    }

    /// Implements the two-call, dedup-by-name expansion: own properties plus
    /// accessor-only properties from the prototype chain.
    async fn expand_properties(&mut self, object_id: &str, parent_prefix: Option<&str>, cdp: &impl CdpClient) -> Result<Vec<Variable>, VariablesError> {
        let own = cdp.get_properties(object_id, true, false).await?;
        let accessors = cdp.get_properties(object_id, false, true).await?;

        let mut seen = std::collections::HashSet::new();
        let mut descriptors = Vec::with_capacity(own.result.len());
        for d in own.result {
            seen.insert(d.name.clone());
            descriptors.push(d);
        }
        for d in accessors.result {
            if seen.insert(d.name.clone()) {
                descriptors.push(d);
            }
        }

        let mut variables = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            variables.push(self.variable_from_descriptor(object_id, parent_prefix, descriptor, cdp).await);
        }
        Ok(variables)
    }

    /// The large-collection path: synthesizes a helper that slices either an
    /// index range (arrays/typed arrays) or a `getOwnPropertyNames` range
    /// (everything else), expands the returned chunk, and keeps only
    /// indexed names.
    async fn expand_paginated(&mut self, object_id: &str, start: i64, count: i64, cdp: &impl CdpClient) -> Result<Vec<Variable>, VariablesError> {
        const SLICE_HELPER: &str = r#"function(start, count) {
            var result = {};
            if (Array.isArray(this) || ArrayBuffer.isView(this)) {
                for (var i = start; i < start + count && i < this.length; i++) { result[i] = this[i]; }
                return result;
            }
            var names = Object.getOwnPropertyNames(this).slice(start, start + count);
            for (var i = 0; i < names.length; i++) { result[names[i]] = this[names[i]]; }
            return result;
        }"#;

        let args = vec![CallArgument { value: Some(serde_json::json!(start)), object_id: None }, CallArgument { value: Some(serde_json::json!(count)), object_id: None }];
        let chunk = cdp.call_function_on(object_id, SLICE_HELPER, args, false).await?;
        let Some(chunk_object_id) = chunk.result.object_id else {
            return Ok(Vec::new());
        };

        let properties = cdp.get_properties(&chunk_object_id, true, false).await?;
        let mut variables = Vec::with_capacity(properties.result.len());
        for descriptor in properties.result {
            if !is_indexed_prop_name(&descriptor.name) {
                continue;
            }
            variables.push(self.variable_from_descriptor(&chunk_object_id, None, descriptor, cdp).await);
        }
        let _ = cdp.release_object(&chunk_object_id).await;
        Ok(variables)
    }

    async fn variable_from_descriptor(&mut self, object_id: &str, parent_prefix: Option<&str>, descriptor: js_dap_cdp::PropertyDescriptor, cdp: &impl CdpClient) -> Variable {
        let evaluate_name = compose_evaluate_name(parent_prefix, &descriptor.name);

        if descriptor.get.is_some() {
            let name_json = serde_json::json!(descriptor.name);
            let args = vec![CallArgument { value: Some(name_json), object_id: None }];
            return match cdp.call_function_on(object_id, "function(p){return this[p]}", args, false).await {
                Ok(result) => match result.exception_details {
                    Some(exception) => plain_variable(&descriptor.name, evaluate_name, exception.text),
                    None => self.render_object_as_variable(&descriptor.name, evaluate_name, result.result),
                },
                Err(err) => plain_variable(&descriptor.name, evaluate_name, err.to_string()),
            };
        }

        if descriptor.set.is_some() {
            return plain_variable(&descriptor.name, evaluate_name, "setter".to_string());
        }

        self.render_object_as_variable(&descriptor.name, evaluate_name, descriptor.value.unwrap_or_default())
    }

    /// Renders a bare `RemoteObject` (an `evaluate`/`evaluateOnCallFrame`
    /// result) the same way a child variable would be, allocating a
    /// [`VariableContainer::Property`] when it is expandable.
    pub fn render_as_evaluate_result(&mut self, object: RemoteObject) -> (String, Option<String>, i64, Option<i64>, Option<i64>) {
        let variable = self.render_object_as_variable("", None, object);
        (variable.value, variable.type_, variable.variables_reference, variable.named_variables, variable.indexed_variables)
    }

    fn render_child(&mut self, name: &str, evaluate_name: Option<String>, object: RemoteObject) -> Variable {
        self.render_object_as_variable(name, evaluate_name, object)
    }

    fn render_object_as_variable(&mut self, name: &str, evaluate_name: Option<String>, object: RemoteObject) -> Variable {
        let value = render_remote_object(&object, false);
        let type_ = Some(object.type_.clone());
        let (variables_reference, named_variables, indexed_variables) = match object.object_id.clone() {
            Some(object_id) => {
                let reference = self.containers.alloc(VariableContainer::Property { object_id, evaluate_name: evaluate_name.clone().unwrap_or_default() });
                let (named, indexed) = estimate_property_counts(&object);
                (reference, named, indexed)
            }
            None => (0, None, None),
        };
        Variable { name: name.to_string(), value, type_, variables_reference, named_variables, indexed_variables, evaluate_name }
    }

    /// `setVariable` for a live container. Scope variables are committed via
    /// `Debugger.setVariableValue`; property variables via a synthesized
    /// assignment through `Runtime.callFunctionOn`.
    pub async fn set_value(&mut self, handle: i64, name: &str, new_value: RemoteObject, cdp: &impl CdpClient) -> Result<String, VariablesError> {
        let container = self.containers.get(handle).cloned().ok_or(VariablesError::InvalidHandle)?;
        match container {
            VariableContainer::Scope { call_frame_id, scope_number, .. } => {
                cdp.set_variable_value(scope_number, name, CallArgument::from_remote_object(&new_value), &call_frame_id).await?;
                Ok(render_remote_object(&new_value, true))
            }
            VariableContainer::Property { object_id, .. } => {
                let key = serde_json::to_string(name).unwrap_or_else(|_| "\"\"".to_string());
                let declaration = format!("function(v){{ return this[{key}] = v }}");
                let result = cdp.call_function_on(&object_id, &declaration, vec![CallArgument::from_remote_object(&new_value)], false).await?;
                Ok(render_remote_object(&result.result, true))
            }
            VariableContainer::LoggedObjects { .. } | VariableContainer::Exception { .. } => Err(VariablesError::SetValueNotSupported),
        }
    }
}

fn plain_variable(name: &str, evaluate_name: Option<String>, value: String) -> Variable {
    Variable { name: name.to_string(), value, type_: None, variables_reference: 0, named_variables: None, indexed_variables: None, evaluate_name }
}

fn apply_filter(variables: Vec<Variable>, filter: Option<VariablesFilter>) -> Vec<Variable> {
    match filter {
        Some(VariablesFilter::Indexed) => variables.into_iter().filter(|v| is_indexed_prop_name(&v.name)).collect(),
        Some(VariablesFilter::Named) => variables.into_iter().filter(|v| !is_indexed_prop_name(&v.name)).collect(),
        None => variables,
    }
}

/// A name is indexed iff it is a canonical non-negative decimal integer:
/// `"0"`, `"1"`, `"42"`, but not `"01"`, `"-1"`, or `"1.0"`.
#[must_use]
pub fn is_indexed_prop_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name == "0" {
        return true;
    }
    if name.starts_with('0') {
        return false;
    }
    name.chars().all(|c| c.is_ascii_digit())
}

fn compose_evaluate_name(parent: Option<&str>, child_name: &str) -> Option<String> {
    let indexed = is_indexed_prop_name(child_name);
    match parent {
        Some(p) if indexed => Some(format!("{p}[{child_name}]")),
        Some(p) => Some(format!("{p}.{child_name}")),
        None => None,
    }
}

/// Property counts drive `namedVariables`/`indexedVariables` in the
/// `variables` response so a client can decide whether to page. When the
/// preview overflowed (or is missing), CDP gives no exact count up front, so
/// we fall back to the same estimate vscode-js-debug uses: arrays report
/// `[length, ownKeys - length + 2]`, sets/maps report `[0, ownKeys + 1]` (the
/// `+1`/`+2` account for the synthetic `length`/`[[Entries]]` own keys DAP
/// clients expect to see alongside the real ones).
fn estimate_property_counts(object: &RemoteObject) -> (Option<i64>, Option<i64>) {
    let is_indexed_subtype = matches!(object.subtype.as_deref(), Some("array") | Some("typedarray"));
    let is_collection_subtype = matches!(object.subtype.as_deref(), Some("map") | Some("set"));
    match &object.preview {
        Some(preview) if !preview.overflow => {
            let (indexed, named) = partition_preview(preview);
            if is_indexed_subtype {
                (if named > 0 { Some(named) } else { None }, Some(indexed))
            } else {
                (Some(named + indexed), None)
            }
        }
        preview => {
            let own_keys = preview.map_or(0, |p| p.properties.len() as i64);
            if is_indexed_subtype {
                let length = object.description.as_deref().and_then(parse_description_length).unwrap_or(own_keys);
                (Some(own_keys - length + 2), Some(length))
            } else if is_collection_subtype {
                (Some(own_keys + 1), Some(0))
            } else {
                (None, None)
            }
        }
    }
}

/// Parses the trailing `(N)` off a CDP object description such as
/// `"Array(10000)"` or `"Int32Array(5)"`.
fn parse_description_length(description: &str) -> Option<i64> {
    let open = description.rfind('(')?;
    let close = description.rfind(')')?;
    if close <= open {
        return None;
    }
    description[open + 1..close].parse().ok()
}

fn partition_preview(preview: &ObjectPreview) -> (i64, i64) {
    let indexed = preview.properties.iter().filter(|p| is_indexed_prop_name(&p.name)).count() as i64;
    let named = preview.properties.len() as i64 - indexed;
    (indexed, named)
}

/// Converts a `RemoteObject` to its DAP display string per the rendering
/// rules: `object`/`undefined`/`function` get structural treatment; numbers
/// (and anything else missing a `value`) fall back to `description`;
/// everything else is the JSON value, quoted when `stringify` is requested.
#[must_use]
pub fn render_remote_object(object: &RemoteObject, stringify: bool) -> String {
    if object.type_ == "object" {
        return match object.subtype.as_deref() {
            Some("null") => "null".to_string(),
            Some("internal#location") => "internal#location".to_string(),
            _ => render_object_preview(object),
        };
    }
    if object.type_ == "undefined" {
        return "undefined".to_string();
    }
    if object.type_ == "function" {
        return render_function_signature(object);
    }
    if object.type_ == "number" || object.value.is_none() {
        return object.description.clone().unwrap_or_default();
    }
    if object.type_ == "boolean" {
        return object.value.as_ref().map(ToString::to_string).unwrap_or_default();
    }

    let Some(value) = &object.value else {
        unreachable!("missing-value case already returned above");
    };
    render_json_primitive(value, stringify)
}

fn render_json_primitive(value: &serde_json::Value, stringify: bool) -> String {
    match value {
        serde_json::Value::String(s) if stringify => format!("\"{s}\""),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_object_preview(object: &RemoteObject) -> String {
    let class_name = object.class_name.as_deref().unwrap_or("Object");
    match &object.preview {
        Some(preview) => {
            let mut parts: Vec<String> = preview.properties.iter().map(|p| format!("{}: {}", p.name, p.value.as_deref().unwrap_or("?"))).collect();
            if preview.overflow {
                parts.push("…".to_string());
            }
            format!("{class_name} {{{}}}", parts.join(", "))
        }
        None => object.description.clone().unwrap_or_else(|| class_name.to_string()),
    }
}

fn render_function_signature(object: &RemoteObject) -> String {
    let description = object.description.as_deref().unwrap_or("");
    if let Some(idx) = description.find('{') {
        format!("{}{{ … }}", &description[..idx])
    } else if let Some(idx) = description.find("=>") {
        format!("{} …", &description[..idx + 2])
    } else {
        description.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use js_dap_cdp::{EvaluateResult, GetPropertiesResult, PauseOnExceptionsState, ScriptPosition, SetBreakpointByUrlResult, SetBreakpointResult};
    use std::sync::Mutex;

    fn primitive(type_: &str, value: serde_json::Value) -> RemoteObject {
        RemoteObject { type_: type_.to_string(), value: Some(value), ..Default::default() }
    }

    #[test]
    fn renders_null_and_internal_location() {
        let null = RemoteObject { type_: "object".to_string(), subtype: Some("null".to_string()), ..Default::default() };
        assert_eq!(render_remote_object(&null, false), "null");

        let loc = RemoteObject { type_: "object".to_string(), subtype: Some("internal#location".to_string()), ..Default::default() };
        assert_eq!(render_remote_object(&loc, false), "internal#location");
    }

    #[test]
    fn renders_undefined_and_booleans() {
        assert_eq!(render_remote_object(&RemoteObject { type_: "undefined".to_string(), ..Default::default() }, false), "undefined");
        assert_eq!(render_remote_object(&primitive("boolean", serde_json::json!(true)), false), "true");
    }

    #[test]
    fn numbers_use_description_to_preserve_infinity() {
        let infinity = RemoteObject { type_: "number".to_string(), description: Some("Infinity".to_string()), ..Default::default() };
        assert_eq!(render_remote_object(&infinity, false), "Infinity");
    }

    #[test]
    fn strings_quote_only_when_stringify_requested() {
        let s = primitive("string", serde_json::json!("hi"));
        assert_eq!(render_remote_object(&s, false), "hi");
        assert_eq!(render_remote_object(&s, true), "\"hi\"");
    }

    #[test]
    fn function_signature_truncates_at_first_brace() {
        let f = RemoteObject { type_: "function".to_string(), description: Some("function add(a, b) { return a + b; }".to_string()), ..Default::default() };
        assert_eq!(render_remote_object(&f, false), "function add(a, b) { … }");
    }

    #[test]
    fn function_signature_truncates_at_arrow() {
        let f = RemoteObject { type_: "function".to_string(), description: Some("(a, b) => a + b".to_string()), ..Default::default() };
        assert_eq!(render_remote_object(&f, false), "(a, b) => …");
    }

    #[test]
    fn indexed_prop_name_rejects_leading_zero_and_signs() {
        assert!(is_indexed_prop_name("0"));
        assert!(is_indexed_prop_name("42"));
        assert!(!is_indexed_prop_name("01"));
        assert!(!is_indexed_prop_name("-1"));
        assert!(!is_indexed_prop_name(""));
        assert!(!is_indexed_prop_name("1.0"));
    }

    #[test]
    fn evaluate_name_composes_dotted_and_indexed_paths() {
        assert_eq!(compose_evaluate_name(Some("obj"), "field"), Some("obj.field".to_string()));
        assert_eq!(compose_evaluate_name(Some("arr"), "3"), Some("arr[3]".to_string()));
        assert_eq!(compose_evaluate_name(None, "topLevel"), None);
    }

    struct FakeCdp {
        properties_by_object: std::collections::HashMap<String, GetPropertiesResult>,
        calls: Mutex<Vec<String>>,
    }

    impl CdpClient for FakeCdp {
        async fn debugger_enable(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn runtime_enable(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn resume(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn step_over(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn step_into(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn step_out(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn pause(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_breakpoint(&self, _script_id: &str, _line: i64, _column: Option<i64>, _condition: Option<&str>) -> Result<SetBreakpointResult, CdpError> {
            unreachable!("not exercised by variable registry tests")
        }
        async fn set_breakpoint_by_url(&self, _url_regex: &str, _line: i64, _column: Option<i64>, _condition: Option<&str>) -> Result<SetBreakpointByUrlResult, CdpError> {
            unreachable!("not exercised by variable registry tests")
        }
        async fn remove_breakpoint(&self, _breakpoint_id: &str) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_pause_on_exceptions(&self, _state: PauseOnExceptionsState) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_blackbox_patterns(&self, _patterns: &[String]) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_blackboxed_ranges(&self, _script_id: &str, _positions: &[ScriptPosition]) -> Result<(), CdpError> {
            Ok(())
        }
        async fn evaluate_on_call_frame(&self, _call_frame_id: &str, _expression: &str, _silent: bool, _generate_preview: bool) -> Result<EvaluateResult, CdpError> {
            unreachable!("not exercised by variable registry tests")
        }
        async fn evaluate(&self, _expression: &str, _return_by_value: bool) -> Result<EvaluateResult, CdpError> {
            unreachable!("not exercised by variable registry tests")
        }
        async fn set_variable_value(&self, _scope_number: i64, _variable_name: &str, _new_value: CallArgument, _call_frame_id: &str) -> Result<(), CdpError> {
            Ok(())
        }
        async fn restart_frame(&self, _call_frame_id: &str) -> Result<(), CdpError> {
            unreachable!("not exercised by variable registry tests")
        }
        async fn get_script_source(&self, _script_id: &str) -> Result<String, CdpError> {
            unreachable!("not exercised by variable registry tests")
        }
        async fn get_properties(&self, object_id: &str, own_properties: bool, accessor_properties_only: bool) -> Result<GetPropertiesResult, CdpError> {
            self.calls.lock().unwrap().push(format!("get_properties({object_id}, own={own_properties}, acc={accessor_properties_only})"));
            Ok(self.properties_by_object.get(object_id).cloned().unwrap_or_default())
        }
        async fn call_function_on(&self, object_id: &str, function_declaration: &str, _arguments: Vec<CallArgument>, _return_by_value: bool) -> Result<EvaluateResult, CdpError> {
            self.calls.lock().unwrap().push(format!("call_function_on({object_id})"));
            if function_declaration.contains("return this[p]") {
                return Ok(EvaluateResult { result: primitive("number", serde_json::json!(7)), exception_details: None });
            }
            Ok(EvaluateResult { result: primitive("undefined", serde_json::Value::Null), exception_details: None })
        }
        async fn release_object(&self, _object_id: &str) -> Result<(), CdpError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn expand_dedupes_own_and_accessor_properties_by_name() {
        let own = js_dap_cdp::PropertyDescriptor { name: "x".to_string(), value: Some(primitive("number", serde_json::json!(1))), get: None, set: None, enumerable: true, is_own: true };
        let accessor_dup = js_dap_cdp::PropertyDescriptor { name: "x".to_string(), value: Some(primitive("number", serde_json::json!(999))), get: None, set: None, enumerable: true, is_own: false };
        let accessor_only = js_dap_cdp::PropertyDescriptor { name: "y".to_string(), value: None, get: Some(primitive("function", serde_json::Value::Null)), set: None, enumerable: true, is_own: false };

        let mut properties_by_object = std::collections::HashMap::new();
        properties_by_object.insert("obj-1".to_string(), GetPropertiesResult { result: vec![own], exception_details: None });
        let cdp = FakeCdp { properties_by_object, calls: Mutex::new(Vec::new()) };

        // Accessor call returns the dup (to prove it's dropped) plus a getter-only entry.
        let mut registry = VariableRegistry::new();
        let handle = registry.alloc(VariableContainer::Property { object_id: "obj-1".to_string(), evaluate_name: "myObj".to_string() });

        // Swap in a second fake whose accessor call includes the extra property,
        // since the simple map above only covers one fixed result per object id.
        struct TwoCallCdp(FakeCdp, Vec<js_dap_cdp::PropertyDescriptor>);
        impl CdpClient for TwoCallCdp {
            async fn debugger_enable(&self) -> Result<(), CdpError> {
                self.0.debugger_enable().await
            }
            async fn runtime_enable(&self) -> Result<(), CdpError> {
                self.0.runtime_enable().await
            }
            async fn resume(&self) -> Result<(), CdpError> {
                self.0.resume().await
            }
            async fn step_over(&self) -> Result<(), CdpError> {
                self.0.step_over().await
            }
            async fn step_into(&self) -> Result<(), CdpError> {
                self.0.step_into().await
            }
            async fn step_out(&self) -> Result<(), CdpError> {
                self.0.step_out().await
            }
            async fn pause(&self) -> Result<(), CdpError> {
                self.0.pause().await
            }
            async fn set_breakpoint(&self, s: &str, l: i64, c: Option<i64>, cond: Option<&str>) -> Result<SetBreakpointResult, CdpError> {
                self.0.set_breakpoint(s, l, c, cond).await
            }
            async fn set_breakpoint_by_url(&self, u: &str, l: i64, c: Option<i64>, cond: Option<&str>) -> Result<SetBreakpointByUrlResult, CdpError> {
                self.0.set_breakpoint_by_url(u, l, c, cond).await
            }
            async fn remove_breakpoint(&self, id: &str) -> Result<(), CdpError> {
                self.0.remove_breakpoint(id).await
            }
            async fn set_pause_on_exceptions(&self, s: PauseOnExceptionsState) -> Result<(), CdpError> {
                self.0.set_pause_on_exceptions(s).await
            }
            async fn set_blackbox_patterns(&self, p: &[String]) -> Result<(), CdpError> {
                self.0.set_blackbox_patterns(p).await
            }
            async fn set_blackboxed_ranges(&self, s: &str, p: &[ScriptPosition]) -> Result<(), CdpError> {
                self.0.set_blackboxed_ranges(s, p).await
            }
            async fn evaluate_on_call_frame(&self, f: &str, e: &str, s: bool, g: bool) -> Result<EvaluateResult, CdpError> {
                self.0.evaluate_on_call_frame(f, e, s, g).await
            }
            async fn evaluate(&self, e: &str, r: bool) -> Result<EvaluateResult, CdpError> {
                self.0.evaluate(e, r).await
            }
            async fn set_variable_value(&self, n: i64, name: &str, v: CallArgument, f: &str) -> Result<(), CdpError> {
                self.0.set_variable_value(n, name, v, f).await
            }
            async fn restart_frame(&self, f: &str) -> Result<(), CdpError> {
                self.0.restart_frame(f).await
            }
            async fn get_script_source(&self, s: &str) -> Result<String, CdpError> {
                self.0.get_script_source(s).await
            }
            async fn get_properties(&self, object_id: &str, own_properties: bool, accessor_properties_only: bool) -> Result<GetPropertiesResult, CdpError> {
                if accessor_properties_only {
                    Ok(GetPropertiesResult { result: self.1.clone(), exception_details: None })
                } else {
                    self.0.get_properties(object_id, own_properties, accessor_properties_only).await
                }
            }
            async fn call_function_on(&self, o: &str, f: &str, a: Vec<CallArgument>, r: bool) -> Result<EvaluateResult, CdpError> {
                self.0.call_function_on(o, f, a, r).await
            }
            async fn release_object(&self, o: &str) -> Result<(), CdpError> {
                self.0.release_object(o).await
            }
        }

        let cdp = TwoCallCdp(cdp, vec![accessor_dup, accessor_only]);
        let variables = registry.expand(handle, None, None, None, &cdp).await.unwrap();

        assert_eq!(variables.len(), 2);
        assert!(variables.iter().any(|v| v.name == "x" && v.value == "1"));
        assert!(variables.iter().any(|v| v.name == "y" && v.value == "7"));
    }

    #[tokio::test]
    async fn setter_only_property_renders_as_literal_setter() {
        let mut registry = VariableRegistry::new();
        let handle = registry.alloc(VariableContainer::Property { object_id: "obj-1".to_string(), evaluate_name: "x".to_string() });
        let descriptor = js_dap_cdp::PropertyDescriptor {
            name: "z".to_string(),
            value: None,
            get: None,
            set: Some(primitive("function", serde_json::Value::Null)),
            enumerable: true,
            is_own: true,
        };
        let mut properties_by_object = std::collections::HashMap::new();
        properties_by_object.insert("obj-1".to_string(), GetPropertiesResult { result: vec![descriptor], exception_details: None });
        let cdp = FakeCdp { properties_by_object, calls: Mutex::new(Vec::new()) };

        let variables = registry.expand(handle, None, None, None, &cdp).await.unwrap();
        assert_eq!(variables[0].value, "setter");
    }

    #[test]
    fn reset_invalidates_prior_handles() {
        let mut registry = VariableRegistry::new();
        let handle = registry.alloc(VariableContainer::LoggedObjects { objects: vec![] });
        registry.reset();
        assert!(registry.get(handle).is_none());
    }
}
