//! `{{field}}` substitution for URLs and identities, and import id parsing

use crate::config::ProviderConfig;
use crate::error::{CloudError, Result};
use crate::state::ResourceState;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("variable pattern is valid"));

/// Substitute every `{{var}}` in `pattern`.
///
/// `{{...BasePath}}` comes from the configured base paths. Any other variable
/// is read from `state`, falling back to the provider default for `project`,
/// `region` and `zone`. An unset variable is a validation error.
pub fn replace_vars(state: &ResourceState, config: &ProviderConfig, pattern: &str) -> Result<String> {
    if VARIABLE.replace_all(pattern, "").contains("{{") {
        return Err(CloudError::Validation(format!(
            "unterminated variable in {:?}",
            pattern
        )));
    }

    let mut out = String::with_capacity(pattern.len());
    let mut last = 0;
    for caps in VARIABLE.captures_iter(pattern) {
        let whole = caps.get_match();
        out.push_str(&pattern[last..whole.start()]);
        out.push_str(&lookup(state, config, &caps[1], pattern)?);
        last = whole.end();
    }
    out.push_str(&pattern[last..]);

    Ok(out)
}

fn lookup(state: &ResourceState, config: &ProviderConfig, var: &str, pattern: &str) -> Result<String> {
    if var.ends_with("BasePath") {
        return config.base_path(var).map(str::to_string);
    }

    match state.get_ok(var) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(CloudError::Validation(format!(
            "{} cannot be used in a URL: {}",
            var, other
        ))),
        None => config.default_var(var).map(str::to_string).ok_or_else(|| {
            CloudError::Validation(format!("{{{{{}}}}} is not set (in {:?})", var, pattern))
        }),
    }
}

/// Anchored regex for an import format: literal text must match exactly and
/// each `{{field}}` becomes a named group over one non-empty path segment.
fn import_regex(format: &str) -> Result<Regex> {
    let mut source = String::from("^");
    let mut last = 0;
    for caps in VARIABLE.captures_iter(format) {
        let whole = caps.get_match();
        source.push_str(&regex::escape(&format[last..whole.start()]));
        source.push_str(&format!("(?P<{}>[^/]+)", &caps[1]));
        last = whole.end();
    }
    source.push_str(&regex::escape(&format[last..]));
    source.push('$');

    Regex::new(&source)
        .map_err(|e| CloudError::InvalidConfig(format!("import format {:?}: {}", format, e)))
}

/// Match `id` against `formats`, first match wins, and store the captured
/// fields in `state`.
///
/// When the formats mention `{{project}}` but the matching one did not
/// capture it, the provider's default project is filled in.
pub fn parse_import_id(
    formats: &[&str],
    id: &str,
    state: &mut ResourceState,
    config: &ProviderConfig,
) -> Result<()> {
    for format in formats {
        let re = import_regex(format)?;
        let Some(caps) = re.captures(id) else {
            continue;
        };
        for field in re.capture_names().flatten() {
            if let Some(value) = caps.name(field) {
                state.set(field, value.as_str());
            }
        }

        let wants_project = formats.iter().any(|f| f.contains("{{project}}"));
        if wants_project && state.get_ok("project").is_none() {
            let project = config.project.as_deref().ok_or_else(|| {
                CloudError::Validation(format!(
                    "import id {:?} has no project and no default project is configured",
                    id
                ))
            })?;
            state.set("project", project);
        }
        return Ok(());
    }

    Err(CloudError::Validation(format!(
        "import id {:?} doesn't match any of the accepted formats: {}",
        id,
        formats.join(", ")
    )))
}
