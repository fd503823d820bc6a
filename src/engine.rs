use std::collections::HashMap;

use crate::error::{MailplateError, MailplateResult};
use crate::interface::{Document, MailplateInterface, ReferenceKind};
use crate::procedure::Procedures;
use crate::template::Template;
use crate::tracing_macros::debug;

/// One named template in an [`EngineConfig`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateConfig {
    pub name: String,
    pub source: String,
}

/// The set of templates an engine is built from, typically read from a
/// configuration file.
///
/// ```json
/// { "templates": [ { "name": "welcome", "source": "Hi $name " } ] }
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub templates: Vec<TemplateConfig>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template<N: Into<String>, S: Into<String>>(mut self, name: N, source: S) -> Self {
        self.templates.push(TemplateConfig {
            name: name.into(),
            source: source.into(),
        });
        self
    }

    /// Reads a configuration from JSON.
    ///
    /// # Errors
    /// - If `json` is not valid JSON or does not have the expected layout.
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> MailplateResult<Self> {
        serde_json::from_str(json).map_err(|e| MailplateError::Config {
            message: e.to_string(),
        })
    }
}

/// `MailplateEngine` is the registry implementation of the
/// `MailplateInterface` trait: named templates, each compiled once.
///
/// # Examples
///
/// ```
/// use mailplate::{Document, MailplateEngine, MailplateInterface, Procedures};
///
/// // Create a new engine
/// let mut engine = MailplateEngine::new();
///
/// // Add a template
/// engine.add_template("greeting", "Hello, $name !").unwrap();
///
/// // Setup document
/// let document = Document::new().insert("name", "World").to_owned();
///
/// // Render template
/// let output = engine
///     .render("greeting", &document, &Procedures::new())
///     .unwrap();
/// assert_eq!(output, "Hello, World!");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct MailplateEngine {
    templates: HashMap<String, Template>,
}

impl MailplateEngine {
    /// Creates a new engine with no templates.
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Builds an engine holding every template of `config`.
    ///
    /// # Errors
    /// - If two entries share a name.
    /// - If any source does not parse.
    pub fn from_config(config: &EngineConfig) -> MailplateResult<Self> {
        let mut engine = Self::new();
        for template in &config.templates {
            engine.add_template(&template.name, &template.source)?;
        }
        debug!(templates = engine.templates.len(), "engine built from config");
        Ok(engine)
    }

    pub fn get_template<N: AsRef<str>>(&self, name: N) -> Option<&Template> {
        self.templates.get(name.as_ref())
    }

    /// Registered template names, sorted.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn template(&self, name: &str) -> MailplateResult<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| MailplateError::MissingTemplate {
                template_name: name.to_string(),
            })
    }
}

impl MailplateInterface for MailplateEngine {
    /// Adds a new template to the engine with the given name and source.
    ///
    /// # Examples
    ///
    /// ```
    /// use mailplate::{MailplateEngine, MailplateError, MailplateInterface};
    ///
    /// let mut engine = MailplateEngine::new();
    /// engine.add_template("greeting", "Hello, $name !").unwrap();
    ///
    /// let err = engine.add_template("greeting", "Hi").unwrap_err();
    /// assert!(matches!(err, MailplateError::TemplateExists { .. }));
    /// ```
    fn add_template<N: AsRef<str>, S: AsRef<str>>(
        &mut self,
        name: N,
        source: S,
    ) -> MailplateResult<()> {
        let name = name.as_ref();

        if self.templates.contains_key(name) {
            return Err(MailplateError::TemplateExists {
                template_name: name.to_string(),
            });
        }

        let template = Template::new(source.as_ref())?;
        debug!(template = name, "template added");
        self.templates.insert(name.to_string(), template);

        Ok(())
    }

    fn render<N: AsRef<str>>(
        &self,
        template_name: N,
        document: &Document,
        procedures: &Procedures<'_>,
    ) -> MailplateResult<String> {
        self.template(template_name.as_ref())?
            .render(document, procedures)
    }

    /// # Examples
    ///
    /// ```
    /// use mailplate::{MailplateEngine, MailplateInterface, ReferenceKind};
    ///
    /// let mut engine = MailplateEngine::new();
    /// engine.add_template("greeting", "Hello, $name !").unwrap();
    ///
    /// let references = engine.references("greeting").unwrap();
    /// assert_eq!(references, vec![("name", ReferenceKind::Variable)]);
    /// ```
    fn references<N: AsRef<str>>(
        &self,
        template_name: N,
    ) -> MailplateResult<Vec<(&str, ReferenceKind)>> {
        Ok(self.template(template_name.as_ref())?.references())
    }
}
