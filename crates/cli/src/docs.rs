//! Rendering label documentation from the taxonomy.
//!
//! The template receives a map from audience heading to the top-level labels
//! for that audience:
//!
//! | key                   | labels with target |
//! |-----------------------|--------------------|
//! | `both issues and PRs` | `both`             |
//! | `only issues`         | `issues`           |
//! | `only PRs`            | `prs`              |
//!
//! Each label exposes its YAML fields (`name`, `color`, `description`,
//! `target`, `prowPlugin`, `addedBy`, `previously`, `deleteAfter`). The
//! `anchor` helper turns a label name into a Markdown anchor by replacing
//! `:` with a space.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use handlebars::{handlebars_helper, Handlebars};
use labels::{Configuration, Label, LabelTarget};
use tracing::info;

const TEMPLATE_NAME: &str = "docs";

handlebars_helper!(anchor: |name: str| name.replace(':', " "));

/// Groups the top-level labels by the audience they apply to.
pub fn labels_by_audience(config: &Configuration) -> BTreeMap<&'static str, Vec<&Label>> {
    BTreeMap::from([
        ("both issues and PRs", config.labels_by_target(LabelTarget::Both)),
        ("only issues", config.labels_by_target(LabelTarget::Issues)),
        ("only PRs", config.labels_by_target(LabelTarget::Prs)),
    ])
}

/// Renders `template` against the taxonomy.
///
/// # Errors
///
/// Returns an error if the template does not parse or fails to render.
pub fn render(template: &str, config: &Configuration) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_helper("anchor", Box::new(anchor));
    handlebars
        .register_template_string(TEMPLATE_NAME, template)
        .context("failed to parse docs template")?;
    handlebars
        .render(TEMPLATE_NAME, &labels_by_audience(config))
        .context("failed to render docs template")
}

/// Renders the template file at `template` into `output`, creating or
/// truncating it.
///
/// # Errors
///
/// Returns an error if either file cannot be read or written, or rendering
/// fails.
pub fn write(template: &Path, output: &Path, config: &Configuration) -> Result<()> {
    let source = std::fs::read_to_string(template)
        .with_context(|| format!("failed to read docs template {}", template.display()))?;
    let rendered = render(&source, config)?;
    std::fs::write(output, rendered)
        .with_context(|| format!("failed to write docs to {}", output.display()))?;
    info!(
        template = %template.display(),
        output = %output.display(),
        "wrote label docs"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> Configuration {
        Configuration {
            labels: vec![
                Label::new("kind/bug", "e11d21", "Categorizes issue or PR as related to a bug."),
                Label::new("lgtm", "15dd18", "Indicates that a PR is ready to be merged.")
                    .with_target(LabelTarget::Prs),
                Label::new(
                    "triage/support",
                    "d455d0",
                    "Indicates an issue that is a support question.",
                )
                .with_target(LabelTarget::Issues),
                Label::new("do-not-merge/hold", "e11d21", "").with_target(LabelTarget::Prs),
            ],
        }
    }

    #[test]
    fn test_labels_are_grouped_by_target() {
        let config = taxonomy();
        let groups = labels_by_audience(&config);

        let names =
            |key: &str| -> Vec<&str> { groups[key].iter().map(|l| l.name.as_str()).collect() };
        assert_eq!(names("both issues and PRs"), vec!["kind/bug"]);
        assert_eq!(names("only issues"), vec!["triage/support"]);
        assert_eq!(names("only PRs"), vec!["lgtm", "do-not-merge/hold"]);
    }

    #[test]
    fn test_render_lists_labels_under_each_heading() {
        let template = concat!(
            "{{#each this}}[{{@key}}]",
            "{{#each this}}<{{name}}|{{color}}>{{/each}}",
            "{{/each}}",
        );

        let rendered = render(template, &taxonomy()).unwrap();

        assert_eq!(
            rendered,
            "[both issues and PRs]<kind/bug|e11d21>\
             [only PRs]<lgtm|15dd18><do-not-merge/hold|e11d21>\
             [only issues]<triage/support|d455d0>"
        );
    }

    #[test]
    fn test_anchor_replaces_colons() {
        let config = Configuration {
            labels: vec![Label::new("sig:node", "0052cc", "")],
        };
        let template = r#"{{#each (lookup this "both issues and PRs")}}{{anchor name}}{{/each}}"#;

        let rendered = render(template, &config).unwrap();
        assert_eq!(rendered, "sig node");
    }

    #[test]
    fn test_bad_template_is_an_error() {
        assert!(render("{{#each this}}", &taxonomy()).is_err());
    }

    #[test]
    fn test_write_truncates_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("labels.md.tmpl");
        let output = dir.path().join("labels.md");
        let source = r#"{{#each (lookup this "only issues")}}{{name}}{{/each}}"#;
        std::fs::write(&template, source).unwrap();
        std::fs::write(&output, "stale content that is much longer than the result").unwrap();

        write(&template, &output, &taxonomy()).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "triage/support");
    }
}
