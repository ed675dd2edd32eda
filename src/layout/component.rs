use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::warn;

use super::LayoutDiagnostic;
use crate::binding::FieldPath;
use crate::expression::Expression;

/// Canonical registry of component kinds.
///
/// Layout JSON is matched case-insensitively against these tags (legacy
/// layouts used inconsistent casing); the parsed kind is always canonical.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum ComponentType {
    Input,
    TextArea,
    Checkboxes,
    RadioButtons,
    Dropdown,
    MultipleSelect,
    Datepicker,
    FileUpload,
    Header,
    Paragraph,
    Image,
    Link,
    Button,
    NavigationButtons,
    NavigationBar,
    AttachmentList,
    InstantiationButton,
    PrintButton,
    Map,
    Address,
    Custom,
    Summary,
    Panel,
    Alert,
    Likert,
    List,
    Group,
    RepeatingGroup,
    Grid,
    Tabs,
    Accordion,
    ButtonGroup,
}

impl ComponentType {
    /// Container-capable kinds: only these may claim children.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ComponentType::Group
                | ComponentType::RepeatingGroup
                | ComponentType::Grid
                | ComponentType::Tabs
                | ComponentType::Accordion
                | ComponentType::ButtonGroup
        )
    }

    /// Kinds whose child set repeats per data-model row.
    pub fn is_repeating(&self) -> bool {
        matches!(self, ComponentType::RepeatingGroup)
    }
}

/// A component record exactly as it appears in layout JSON, before
/// normalization. Unknown per-type properties are retained in `extra` and
/// may themselves be expressions.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComponent {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub data_model_bindings: BTreeMap<String, String>,
    #[serde(default)]
    pub text_resource_bindings: BTreeMap<String, Expression>,
    #[serde(default)]
    pub hidden: Option<Expression>,
    #[serde(default)]
    pub required: Option<Expression>,
    #[serde(default)]
    pub read_only: Option<Expression>,
    #[serde(default)]
    pub options_id: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A normalized component: canonical type tag, parsed binding paths.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    pub id: String,
    pub kind: ComponentType,
    pub children: Vec<String>,
    pub bindings: BTreeMap<String, FieldPath>,
    pub texts: BTreeMap<String, Expression>,
    pub hidden: Option<Expression>,
    pub required: Option<Expression>,
    pub read_only: Option<Expression>,
    pub options_id: Option<String>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One page of normalized components, in declaration order, with an id
/// index for O(1) lookup.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub id: String,
    components: Vec<Component>,
    index: HashMap<String, usize>,
}

impl Page {
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.index.get(id).map(|&i| &self.components[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }
}

/// All pages of a layout, normalized.
///
/// Malformed pieces (unknown type, duplicate id, unparsable binding,
/// children on a non-container) are dropped individually and reported as
/// diagnostics; the rest of the layout still renders.
#[derive(Clone, Debug, Default)]
pub struct LayoutSet {
    pages: Vec<Page>,
    diagnostics: Vec<LayoutDiagnostic>,
}

impl LayoutSet {
    /// Parses a `{pageId: [component, ...]}` object. Pages come out ordered
    /// by page id; components keep declaration order.
    pub fn from_json(raw: &serde_json::Value) -> Result<LayoutSet, super::LayoutError> {
        let map = raw
            .as_object()
            .ok_or_else(|| super::LayoutError::InvalidShape("expected a page object".into()))?;
        let mut pages = Vec::new();
        for (page_id, components) in map {
            let items = components.as_array().ok_or_else(|| {
                super::LayoutError::InvalidShape(format!(
                    "page '{}' is not a component array",
                    page_id
                ))
            })?;
            let mut raws = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match serde_json::from_value::<RawComponent>(item.clone()) {
                    Ok(raw) => raws.push(raw),
                    Err(e) => {
                        return Err(super::LayoutError::InvalidShape(format!(
                            "page '{}' component {}: {}",
                            page_id, i, e
                        )));
                    }
                }
            }
            pages.push((page_id.clone(), raws));
        }
        Ok(Self::from_pages(pages))
    }

    pub fn from_pages(pages: Vec<(String, Vec<RawComponent>)>) -> LayoutSet {
        let mut layout = LayoutSet::default();
        for (page_id, raws) in pages {
            let mut page = Page {
                id: page_id.clone(),
                ..Page::default()
            };
            for raw in raws {
                let Some(component) = layout.normalize(&page_id, raw) else {
                    continue;
                };
                if page.contains(&component.id) {
                    layout.report(LayoutDiagnostic::DuplicateComponentId {
                        page: page_id.clone(),
                        id: component.id.clone(),
                    });
                    continue;
                }
                page.index.insert(component.id.clone(), page.components.len());
                page.components.push(component);
            }
            layout.pages.push(page);
        }
        layout
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn diagnostics(&self) -> &[LayoutDiagnostic] {
        &self.diagnostics
    }

    fn report(&mut self, diagnostic: LayoutDiagnostic) {
        warn!(%diagnostic, "layout configuration error");
        self.diagnostics.push(diagnostic);
    }

    fn normalize(&mut self, page_id: &str, raw: RawComponent) -> Option<Component> {
        let kind = match ComponentType::from_str(&raw.component_type) {
            Ok(kind) => kind,
            Err(_) => {
                self.report(LayoutDiagnostic::UnknownComponentType {
                    page: page_id.to_string(),
                    id: raw.id.clone(),
                    type_name: raw.component_type.clone(),
                });
                return None;
            }
        };
        let children = if raw.children.is_empty() || kind.is_container() {
            raw.children
        } else {
            self.report(LayoutDiagnostic::ChildrenOnNonContainer {
                page: page_id.to_string(),
                id: raw.id.clone(),
            });
            Vec::new()
        };
        let mut bindings = BTreeMap::new();
        for (name, path) in raw.data_model_bindings {
            match FieldPath::parse(&path) {
                Ok(parsed) => {
                    bindings.insert(name, parsed);
                }
                Err(_) => self.report(LayoutDiagnostic::InvalidBinding {
                    page: page_id.to_string(),
                    id: raw.id.clone(),
                    binding: name,
                    path,
                }),
            }
        }
        Some(Component {
            id: raw.id,
            kind,
            children,
            bindings,
            texts: raw.text_resource_bindings,
            hidden: raw.hidden,
            required: raw.required,
            read_only: raw.read_only,
            options_id: raw.options_id,
            extra: raw.extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_type_parsing_is_case_insensitive() {
        assert_eq!(
            ComponentType::from_str("repeatinggroup").unwrap(),
            ComponentType::RepeatingGroup
        );
        assert_eq!(
            ComponentType::from_str("INPUT").unwrap(),
            ComponentType::Input
        );
        assert!(ComponentType::from_str("Blinker").is_err());
    }

    #[test]
    fn test_unknown_type_dropped_with_diagnostic() {
        let layout = LayoutSet::from_json(&json!({
            "page1": [
                {"id": "a", "type": "Input"},
                {"id": "b", "type": "Hologram"}
            ]
        }))
        .unwrap();
        let page = layout.page("page1").unwrap();
        assert!(page.contains("a"));
        assert!(!page.contains("b"));
        assert_eq!(layout.diagnostics().len(), 1);
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let layout = LayoutSet::from_json(&json!({
            "page1": [
                {"id": "a", "type": "Input", "dataModelBindings": {"simpleBinding": "first"}},
                {"id": "a", "type": "Header"}
            ]
        }))
        .unwrap();
        let page = layout.page("page1").unwrap();
        assert_eq!(page.components().len(), 1);
        assert_eq!(page.component("a").unwrap().kind, ComponentType::Input);
        assert!(matches!(
            layout.diagnostics()[0],
            LayoutDiagnostic::DuplicateComponentId { .. }
        ));
    }

    #[test]
    fn test_children_on_non_container_cleared() {
        let layout = LayoutSet::from_json(&json!({
            "page1": [
                {"id": "a", "type": "Input", "children": ["b"]},
                {"id": "b", "type": "Input"}
            ]
        }))
        .unwrap();
        assert!(layout.page("page1").unwrap().component("a").unwrap().children.is_empty());
        assert_eq!(layout.diagnostics().len(), 1);
    }

    #[test]
    fn test_expression_properties_deserialize() {
        let layout = LayoutSet::from_json(&json!({
            "page1": [{
                "id": "a",
                "type": "Input",
                "hidden": {"function": "equals", "args": [{"dataModel": "mode"}, "simple"]},
                "required": true,
                "dataModelBindings": {"simpleBinding": "person.name"},
                "textResourceBindings": {"title": "some.key"}
            }]
        }))
        .unwrap();
        let c = layout.page("page1").unwrap().component("a").unwrap();
        assert!(matches!(c.hidden, Some(Expression::Call { .. })));
        assert_eq!(c.required, Some(Expression::literal(true)));
        assert_eq!(
            c.bindings.get("simpleBinding").unwrap().to_dotted(),
            "person.name"
        );
    }
}
