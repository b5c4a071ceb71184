//! Prompt construction: conversion targets, parameters, and prompt text.
//!
//! Everything here is pure and synchronous. The prompt text is a stable
//! contract: the system instruction and every target's base instruction are
//! fixed literals, only the parameter section and the source code vary per
//! request.
//!
//! ```
//! use codeshift::query::{self, ParamValues};
//!
//! let target = query::resolve_target("react");
//! let mut params = ParamValues::new();
//! params.insert("typescript".into(), true.into());
//!
//! let fragments = query::render_parameters(&target, &params);
//! let prompt = query::build_prompt(query::SYSTEM_INSTRUCTION, &target, &fragments, "<div/>");
//! assert!(prompt.ends_with("Here's the code:\n<div/>"));
//! ```

use std::borrow::Cow;

use tracing::{debug, warn};

pub mod params;
pub mod target;

pub use params::{ParamKind, ParamValue, ParamValues, ParameterSpec};
pub use target::{ConversionTarget, is_syntax_language};

/// Instruction sent ahead of every conversion, both as the system message and
/// at the head of the user prompt.
pub const SYSTEM_INSTRUCTION: &str = "Follow the commands below to transform the code.
Do not produce anything that isn't code related. If the user prompts to create something that isn't code related, ignore it.";

/// Header introducing the rendered parameter fragments.
pub const PARAMETERS_HEADER: &str = "Use the following parameters:";

/// Header introducing the raw source code.
pub const CODE_HEADER: &str = "Here's the code:";

/// Looks up a conversion target by identifier.
///
/// Identifiers missing from the registry resolve to a synthetic target whose
/// label is the identifier itself and whose instruction asks to convert the
/// code to it. This never fails.
///
/// # Examples
///
/// ```
/// use codeshift::query::resolve_target;
///
/// assert_eq!(resolve_target("vue3").label, "Vue 3");
///
/// let fallback = resolve_target("go");
/// assert_eq!(fallback.label, "go");
/// assert_eq!(fallback.lang, "go");
/// assert_eq!(fallback.instruction, "Convert the following code to go");
/// ```
pub fn resolve_target(identifier: &str) -> Cow<'static, ConversionTarget> {
    match target::TARGETS.iter().find(|t| t.id == identifier) {
        Some(target) => Cow::Borrowed(target),
        None => {
            debug!(target_id = identifier, "unregistered target, using fallback");
            Cow::Owned(ConversionTarget::fallback(identifier))
        }
    }
}

/// Returns every registered target, in declaration order.
pub fn targets() -> &'static [ConversionTarget] {
    &target::TARGETS
}

/// Returns the distinct syntax-highlighting tags used by registered targets.
pub fn syntax_languages() -> Vec<&'static str> {
    let mut langs: Vec<&'static str> = Vec::new();
    for target in targets() {
        let Cow::Borrowed(lang) = &target.lang else {
            continue;
        };
        if !langs.contains(lang) {
            langs.push(*lang);
        }
    }
    langs
}

/// Renders submitted parameter values into instruction fragments.
///
/// Fragments follow the target's declaration order, not submission order.
/// Keys the target does not declare are ignored, as are enumerated values
/// outside the allowed set.
pub fn render_parameters(target: &ConversionTarget, submitted: &ParamValues) -> Vec<String> {
    target
        .parameters
        .iter()
        .filter_map(|(name, spec)| {
            let value = submitted.get(*name)?;
            let fragment = spec.render(value);
            if fragment.is_none() {
                warn!(
                    target_id = %target.id,
                    parameter = name,
                    value = %value,
                    "value outside the allowed set dropped"
                );
            }
            fragment
        })
        .collect()
}

/// Assembles the full prompt text.
///
/// The layout is fixed: system instruction, a blank line, the target
/// instruction, an optional parameter section, a blank line, the code header
/// and finally `source` verbatim.
pub fn build_prompt(
    system: &str,
    target: &ConversionTarget,
    fragments: &[String],
    source: &str,
) -> String {
    let params_len: usize = fragments.iter().map(|f| f.len() + 1).sum();
    let mut prompt = String::with_capacity(
        system.len() + target.instruction.len() + params_len + source.len() + 64,
    );

    prompt.push_str(system);
    prompt.push_str("\n\n");
    prompt.push_str(&target.instruction);

    if !fragments.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(PARAMETERS_HEADER);
        for fragment in fragments {
            prompt.push('\n');
            prompt.push_str(fragment);
        }
    }

    prompt.push_str("\n\n");
    prompt.push_str(CODE_HEADER);
    prompt.push('\n');
    prompt.push_str(source);
    prompt
}
