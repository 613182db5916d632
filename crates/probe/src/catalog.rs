//! Variant catalog: which (component, variant) pairs a run visits

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{ProbeError, ProbeResult};

const FRAME_VARIANTS: &[&str] = &[
    "default",
    "with-logo",
    "with-notifications",
    "ecommerce-layout",
    "minimal-layout",
    "responsive-behavior",
];

const BREADCRUMBS_VARIANTS: &[&str] = &[
    "default",
    "short-path",
    "long-path",
    "product-navigation",
    "ecommerce-navigation",
    "admin-panel",
    "documentation-site",
];

/// Variants of one component, in visiting order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVariants {
    pub component: String,
    pub variants: Vec<String>,
}

/// Ordered component → variants mapping
///
/// YAML form:
///
/// ```yaml
/// components:
///   - component: frame
///     variants: [default, with-logo]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCatalog {
    pub components: Vec<ComponentVariants>,
}

/// One (component, variant) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry<'a> {
    pub component: &'a str,
    pub variant: &'a str,
}

impl Default for VariantCatalog {
    fn default() -> Self {
        Self::new()
            .with_component("frame", FRAME_VARIANTS.iter().copied())
            .with_component("breadcrumbs", BREADCRUMBS_VARIANTS.iter().copied())
    }
}

impl VariantCatalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self { components: Vec::new() }
    }

    pub fn with_component<I, S>(mut self, component: &str, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components.push(ComponentVariants {
            component: component.to_string(),
            variants: variants.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Parse a catalog from YAML
    pub fn from_yaml(yaml: &str) -> ProbeResult<Self> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a YAML file
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject blank names and duplicates
    pub fn validate(&self) -> ProbeResult<()> {
        let mut seen_components = HashSet::new();
        for entry in &self.components {
            if entry.component.trim().is_empty() {
                return Err(ProbeError::Catalog("empty component name".into()));
            }
            if !seen_components.insert(entry.component.as_str()) {
                return Err(ProbeError::Catalog(format!(
                    "component '{}' listed twice",
                    entry.component
                )));
            }
            let mut seen_variants = HashSet::new();
            for variant in &entry.variants {
                if variant.trim().is_empty() {
                    return Err(ProbeError::Catalog(format!(
                        "empty variant name in component '{}'",
                        entry.component
                    )));
                }
                if !seen_variants.insert(variant.as_str()) {
                    return Err(ProbeError::Catalog(format!(
                        "variant '{}' listed twice in component '{}'",
                        variant, entry.component
                    )));
                }
            }
        }
        Ok(())
    }

    /// Keep only the named components; unknown names are an error
    pub fn filter(&self, components: &[String]) -> ProbeResult<Self> {
        if components.is_empty() {
            return Ok(self.clone());
        }
        for name in components {
            if !self.components.iter().any(|c| &c.component == name) {
                return Err(ProbeError::Catalog(format!("unknown component '{}'", name)));
            }
        }
        Ok(Self {
            components: self
                .components
                .iter()
                .filter(|c| components.contains(&c.component))
                .cloned()
                .collect(),
        })
    }

    /// All pairs in catalog order
    pub fn entries(&self) -> impl Iterator<Item = CatalogEntry<'_>> {
        self.components.iter().flat_map(|c| {
            c.variants.iter().map(move |v| CatalogEntry {
                component: c.component.as_str(),
                variant: v.as_str(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.components.iter().map(|c| c.variants.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Story id for a variant: `<scope>-<component>--<variant>`
pub fn story_id(scope: &str, component: &str, variant: &str) -> String {
    format!("{}-{}--{}", scope, component.to_lowercase(), variant)
}

/// Preview URL for a variant
pub fn story_url(base_url: &str, scope: &str, component: &str, variant: &str) -> String {
    format!(
        "{}/iframe.html?id={}&args=&viewMode=story",
        base_url.trim_end_matches('/'),
        story_id(scope, component, variant)
    )
}
