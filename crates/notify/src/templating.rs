//! Minijinja template rendering for renewal notifications.
//!
//! Templates are arbitrary strings (operators may override the defaults),
//! so a fresh [`minijinja::Environment`] is created per render call.

use crate::traits::NotifyError;

/// Subject used when no override is configured.
pub const DEFAULT_SUBJECT_TEMPLATE: &str =
    "[certkeeper] Certificate renewal {{ outcome.status }} for {{ resource.namespace }}/{{ resource.name }}";

/// Body used when no override is configured.
pub const DEFAULT_BODY_TEMPLATE: &str = "\
Certificate renewal {{ outcome.status | upper }} for {{ resource.namespace }}/{{ resource.name }}
{% if resource.hosts %}
Hosts: {{ resource.hosts | join(\", \") }}
{% endif %}
Detail: {{ outcome.detail }}
Completed at: {{ outcome.completed_at }}
Reported at: {{ now }}
";

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    pub resource: ResourceContext,
    pub outcome: OutcomeContext,
    /// Current timestamp in ISO 8601 format.
    pub now: String,
}

/// The routing resource a renewal ran for.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResourceContext {
    pub namespace: String,
    pub name: String,
    pub hosts: Vec<String>,
}

/// What the issuer reported.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OutcomeContext {
    pub success: bool,
    /// `"succeeded"` or `"failed"`.
    pub status: String,
    pub detail: String,
    pub completed_at: String,
}

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    subject_template: String,
    body_template: String,
}

impl TemplateRenderer {
    /// Renderer using [`DEFAULT_SUBJECT_TEMPLATE`] and [`DEFAULT_BODY_TEMPLATE`].
    pub fn new() -> Self {
        Self {
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            body_template: DEFAULT_BODY_TEMPLATE.to_string(),
        }
    }

    /// Renderer with custom templates, validated up front.
    pub fn with_templates(subject: String, body: String) -> Result<Self, NotifyError> {
        let renderer = Self {
            subject_template: subject,
            body_template: body,
        };
        renderer.validate(&renderer.subject_template)?;
        renderer.validate(&renderer.body_template)?;
        Ok(renderer)
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_function("env", env_function);
        env
    }

    pub fn render(&self, template_str: &str, ctx: &TemplateContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Render the configured subject and body.
    pub fn render_notification(&self, ctx: &TemplateContext) -> Result<(String, String), NotifyError> {
        let subject = self.render(&self.subject_template, ctx)?;
        let body = self.render(&self.body_template, ctx)?;
        Ok((subject.trim().to_string(), body))
    }

    /// Parse without rendering.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        Self::build_env()
            .template_from_str(template_str)
            .map(|_| ())
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// `env('NAME')` in templates; unset variables render as an empty string.
fn env_function(name: String) -> String {
    std::env::var(&name).unwrap_or_else(|_| {
        tracing::warn!(var = %name, "template references unset environment variable");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context(success: bool) -> TemplateContext {
        TemplateContext {
            resource: ResourceContext {
                namespace: "web".to_string(),
                name: "shop".to_string(),
                hosts: vec!["shop.example.com".to_string(), "www.shop.example.com".to_string()],
            },
            outcome: OutcomeContext {
                success,
                status: if success { "succeeded" } else { "failed" }.to_string(),
                detail: "new certificate valid until 2031-01-01".to_string(),
                completed_at: "2030-12-01T00:00:00Z".to_string(),
            },
            now: "2030-12-01T00:00:05Z".to_string(),
        }
    }

    #[test]
    fn default_subject_names_resource_and_status() {
        let renderer = TemplateRenderer::new();
        let (subject, _) = renderer.render_notification(&sample_context(true)).unwrap();
        assert_eq!(
            subject,
            "[certkeeper] Certificate renewal succeeded for web/shop"
        );
    }

    #[test]
    fn default_body_lists_hosts_and_detail() {
        let renderer = TemplateRenderer::new();
        let (_, body) = renderer.render_notification(&sample_context(false)).unwrap();
        assert!(body.contains("Certificate renewal FAILED"), "got: {body}");
        assert!(body.contains("shop.example.com, www.shop.example.com"), "got: {body}");
        assert!(body.contains("valid until 2031-01-01"), "got: {body}");
    }

    #[test]
    fn custom_templates_render() {
        let renderer = TemplateRenderer::with_templates(
            "{{ resource.name | upper }}".to_string(),
            "{% if outcome.success %}ok{% else %}bad{% endif %}".to_string(),
        )
        .unwrap();
        let (subject, body) = renderer.render_notification(&sample_context(true)).unwrap();
        assert_eq!(subject, "SHOP");
        assert_eq!(body, "ok");
    }

    #[test]
    fn invalid_template_is_rejected_up_front() {
        let err = TemplateRenderer::with_templates("{{ unclosed".to_string(), "body".to_string())
            .unwrap_err()
            .to_string();
        assert!(err.contains("Template rendering failed"), "got: {err}");
    }

    #[test]
    fn env_function_reads_variables() {
        std::env::set_var("CERTKEEPER_TEMPLATE_TEST_CLUSTER", "prod-eu");
        let renderer = TemplateRenderer::new();
        let out = renderer
            .render("{{ env('CERTKEEPER_TEMPLATE_TEST_CLUSTER') }}", &sample_context(true))
            .unwrap();
        assert_eq!(out, "prod-eu");
        std::env::remove_var("CERTKEEPER_TEMPLATE_TEST_CLUSTER");
    }
}
