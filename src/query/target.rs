//! The fixed registry of conversion targets.

use std::borrow::Cow;

use super::params::{ParamValue, ParamValues, ParameterSpec};

/// A named output representation the assistant can convert code into.
///
/// Registered targets live in a static table and borrow all of their text;
/// fallback targets built by [`resolve_target`](super::resolve_target) own
/// theirs.
#[derive(Debug, Clone)]
pub struct ConversionTarget {
    pub id: Cow<'static, str>,
    pub label: Cow<'static, str>,
    pub icon: Cow<'static, str>,
    /// Syntax-highlighting language tag for the converted output.
    pub lang: Cow<'static, str>,
    pub instruction: Cow<'static, str>,
    /// Declared parameters, in declaration order.
    pub parameters: &'static [(&'static str, ParameterSpec)],
}

impl ConversionTarget {
    const fn registered(
        id: &'static str,
        label: &'static str,
        icon: &'static str,
        lang: &'static str,
        instruction: &'static str,
        parameters: &'static [(&'static str, ParameterSpec)],
    ) -> Self {
        Self {
            id: Cow::Borrowed(id),
            label: Cow::Borrowed(label),
            icon: Cow::Borrowed(icon),
            lang: Cow::Borrowed(lang),
            instruction: Cow::Borrowed(instruction),
            parameters,
        }
    }

    /// Builds the synthetic target used for identifiers missing from the registry.
    pub(super) fn fallback(identifier: &str) -> Self {
        let lang = if is_syntax_language(identifier) {
            identifier.to_owned()
        } else {
            "markdown".to_owned()
        };

        Self {
            id: Cow::Owned(identifier.to_owned()),
            label: Cow::Owned(identifier.to_owned()),
            icon: Cow::Borrowed("code"),
            lang: Cow::Owned(lang),
            instruction: Cow::Owned(format!("Convert the following code to {identifier}")),
            parameters: &[],
        }
    }

    /// Returns the declaration for `name`, if this target declares it.
    pub fn parameter(&self, name: &str) -> Option<&'static ParameterSpec> {
        self.parameters
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, spec)| spec)
    }

    /// Keeps only the form-like pairs whose key this target declares.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeshift::query::resolve_target;
    ///
    /// let react = resolve_target("react");
    /// let params = react.filter_params([("typescript", "on"), ("theme", "dark")]);
    /// assert_eq!(params.len(), 1);
    /// assert!(params["typescript"].is_truthy());
    /// ```
    pub fn filter_params<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> ParamValues
    where
        K: AsRef<str>,
        V: Into<ParamValue>,
    {
        pairs
            .into_iter()
            .filter(|(key, _)| self.parameter(key.as_ref()).is_some())
            .map(|(key, value)| (key.as_ref().to_owned(), value.into()))
            .collect()
    }

    /// Returns `true` if this target comes from the static registry.
    pub fn is_registered(&self) -> bool {
        matches!(self.id, Cow::Borrowed(_))
    }
}

const INSTRUCTION_CSS: &str = "Convert the following tailwind-css code to normal CSS.
Use the theme function when possible, e.g. '@apply text-white' should become 'color: theme(\"colors.white\")'.
Also, be smart with opacity colors. e.g. '@apply bg-black-50' should become 'background-color: theme(\"colors.black/0.5\")'.
Do not use CSS vars. Do not use hex color values.
For hover states, use SCSS-like nesting. e.g. '@apply hover:bg-black-50' should become '&:hover { background-color: theme(\"colors.black/0.5\") }'.";

const INSTRUCTION_TAILWIND: &str = "Convert the following CSS code to Tailwind CSS code. Use the @apply directive.
e.g. .input { border-radius: theme('borderRadius.md'); background-color: theme('colors.black/0.5');} should become <input class=\"rounded-md bg-black/50\" />";

fn svelte_typescript(on: bool) -> String {
    if on {
        "Use TypeScript in a <script lang=\"ts\"> block.".to_owned()
    } else {
        "Use plain JavaScript in the <script> block.".to_owned()
    }
}

fn react_typescript(on: bool) -> String {
    if on {
        "Write the component in TypeScript (TSX) with typed props.".to_owned()
    } else {
        "Write the component in plain JavaScript (JSX).".to_owned()
    }
}

fn vue3_api(api: &str) -> String {
    match api {
        "composition" => "Use the Composition API with <script setup>.".to_owned(),
        other => format!("Use the {} API with an exported component definition.", capitalize(other)),
    }
}

fn angular_standalone(on: bool) -> String {
    if on {
        "Make it a standalone component.".to_owned()
    } else {
        "Declare the component in an NgModule.".to_owned()
    }
}

fn python_type_hints(on: bool) -> String {
    if on {
        "Add type hints to every function signature.".to_owned()
    } else {
        "Do not add type hints.".to_owned()
    }
}

fn typescript_strict(on: bool) -> String {
    if on {
        "The code must compile in strict mode. Do not use `any`.".to_owned()
    } else {
        "Loose typing is acceptable where inference fails.".to_owned()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const SVELTE_PARAMS: &[(&str, ParameterSpec)] =
    &[("typescript", ParameterSpec::boolean("Use TypeScript", svelte_typescript))];

const REACT_PARAMS: &[(&str, ParameterSpec)] =
    &[("typescript", ParameterSpec::boolean("Use TypeScript", react_typescript))];

const VUE3_PARAMS: &[(&str, ParameterSpec)] = &[(
    "api",
    ParameterSpec::enumerated("API style", &["composition", "options"], vue3_api),
)];

const ANGULAR_PARAMS: &[(&str, ParameterSpec)] = &[(
    "standalone",
    ParameterSpec::boolean("Standalone component", angular_standalone),
)];

const PYTHON_PARAMS: &[(&str, ParameterSpec)] =
    &[("typeHints", ParameterSpec::boolean("Type hints", python_type_hints))];

const TYPESCRIPT_PARAMS: &[(&str, ParameterSpec)] =
    &[("strict", ParameterSpec::boolean("Strict mode", typescript_strict))];

pub(super) static TARGETS: [ConversionTarget; 11] = [
    ConversionTarget::registered(
        "svelte",
        "Svelte",
        "svelte",
        "svelte",
        "Convert the following component to a Svelte component.\nDon't import useState, as Svelte does not have it.",
        SVELTE_PARAMS,
    ),
    ConversionTarget::registered(
        "react",
        "React",
        "react",
        "tsx",
        "Convert the following component to a React component.\nShow the component directly, without wrapping it in 'jsx' quotes.",
        REACT_PARAMS,
    ),
    ConversionTarget::registered(
        "vue2",
        "Vue 2",
        "vue",
        "vue",
        "Convert the following component to a Vue 2 component.",
        &[],
    ),
    ConversionTarget::registered(
        "vue3",
        "Vue 3",
        "vue",
        "vue",
        "Convert the following component to a Vue 3 component, using SFCs and template tags.\nUse refs for state, and defineProps for props (if needed). Do not use useState.",
        VUE3_PARAMS,
    ),
    ConversionTarget::registered(
        "angular",
        "Angular",
        "angular",
        "ts",
        "Convert the following component to an Angular component.",
        ANGULAR_PARAMS,
    ),
    ConversionTarget::registered("css", "CSS", "css", "css", INSTRUCTION_CSS, &[]),
    ConversionTarget::registered(
        "tailwind",
        "Tailwind",
        "tailwind",
        "css",
        INSTRUCTION_TAILWIND,
        &[],
    ),
    ConversionTarget::registered(
        "python",
        "Python",
        "python",
        "python",
        "Convert the following code to Python 3.",
        PYTHON_PARAMS,
    ),
    ConversionTarget::registered(
        "javascript",
        "JavaScript",
        "javascript",
        "js",
        "Convert the following code to JavaScript.",
        &[],
    ),
    ConversionTarget::registered(
        "typescript",
        "TypeScript",
        "typescript",
        "ts",
        "Convert the following code to TypeScript.",
        TYPESCRIPT_PARAMS,
    ),
    ConversionTarget::registered(
        "rust",
        "Rust",
        "rust",
        "rust",
        "Convert the following code to Rust.",
        &[],
    ),
];

// Highlighting grammars the UI ships, beyond the tags registered targets use.
const SYNTAX_LANGUAGES: &[&str] = &[
    "bash", "c", "cpp", "csharp", "css", "dart", "elixir", "go", "graphql", "haskell", "html",
    "java", "js", "json", "jsx", "kotlin", "less", "lua", "markdown", "php", "python", "ruby",
    "rust", "scala", "scss", "sql", "svelte", "swift", "toml", "ts", "tsx", "vue", "yaml", "zig",
];

/// Returns `true` if `tag` is a syntax-highlighting language the UI recognises.
pub fn is_syntax_language(tag: &str) -> bool {
    SYNTAX_LANGUAGES.contains(&tag)
}
