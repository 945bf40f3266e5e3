//! Vault schema: note types, their fields, and type resolution from frontmatter.
//!
//! Types form a tree through `extends`. A type path joins the ancestor chain with `/`
//! (`objective/task`). Notes identify their type through discriminator fields: the root
//! segment lives under `type`, each further segment under `<parent>-type`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::note::Frontmatter;

/// Default schema location, relative to the vault root.
pub const DEFAULT_SCHEMA_PATH: &str = ".vaultfix/schema.json";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Schema {
    #[serde(default)]
    pub types: BTreeMap<String, TypeDef>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TypeDef {
    pub extends: Option<String>,
    /// Directory notes of this type live in, relative to the vault root
    pub output_dir: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
    #[serde(default)]
    pub field_order: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Boolean,
    Date,
    Select,
    Relation,
    List,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FieldDef {
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    pub default: Option<Value>,
    /// Field holds a list of values
    #[serde(default)]
    pub multiple: bool,
    /// Type names a relation field may point at
    #[serde(default)]
    pub source: Vec<String>,
}

impl FieldDef {
    pub fn expects_list(&self) -> bool {
        self.multiple || self.kind == FieldKind::List
    }
}

impl Schema {
    /// Load a schema from JSON or YAML, chosen by file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read schema: {}", path.display()))?;
        let schema: Schema = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
                .with_context(|| format!("parse schema: {}", path.display()))?,
            _ => serde_json::from_str(&contents)
                .with_context(|| format!("parse schema: {}", path.display()))?,
        };
        schema.check_inheritance()?;
        Ok(schema)
    }

    /// Reject unknown parents and inheritance cycles so ancestry walks terminate.
    fn check_inheritance(&self) -> Result<()> {
        for name in self.types.keys() {
            self.ancestry(name)?;
        }
        Ok(())
    }

    /// Type names from the root down to `name`.
    fn ancestry(&self, name: &str) -> Result<Vec<&str>> {
        let mut chain = Vec::new();
        let mut current = name;
        loop {
            let Some((key, def)) = self.types.get_key_value(current) else {
                bail!("unknown type '{}'", current);
            };
            if chain.contains(&key.as_str()) {
                bail!("type inheritance cycle through '{}'", key);
            }
            chain.push(key.as_str());
            match &def.extends {
                Some(parent) => current = parent.as_str(),
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    fn children(&self, name: &str) -> Vec<&str> {
        self.types
            .iter()
            .filter(|(_, def)| def.extends.as_deref() == Some(name))
            .map(|(child, _)| child.as_str())
            .collect()
    }

    /// Full path for a type name (`task` -> `objective/task`).
    pub fn type_path(&self, name: &str) -> Option<String> {
        self.ancestry(name).ok().map(|chain| chain.join("/"))
    }

    /// Resolve a note's type path from its discriminator fields.
    pub fn resolve_type(&self, frontmatter: &Frontmatter) -> Option<String> {
        let root = frontmatter.get("type")?.as_str()?;
        let def = self.types.get(root)?;
        if def.extends.is_some() {
            return None;
        }

        let mut path = vec![root.to_string()];
        let mut current = root.to_string();
        loop {
            let children = self.children(&current);
            if children.is_empty() {
                break;
            }
            let key = format!("{current}-type");
            let Some(child) = frontmatter.get(key.as_str()).and_then(Value::as_str) else {
                break;
            };
            if !children.contains(&child) {
                break;
            }
            path.push(child.to_string());
            current = child.to_string();
        }
        Some(path.join("/"))
    }

    /// Fields for a type, inherited along the ancestor chain; descendants override.
    pub fn fields_for_type(&self, type_path: &str) -> BTreeMap<String, FieldDef> {
        let mut fields = BTreeMap::new();
        for segment in type_path.split('/') {
            if let Some(def) = self.types.get(segment) {
                for (name, field) in &def.fields {
                    fields.insert(name.clone(), field.clone());
                }
            }
        }
        fields
    }

    /// Field order for writing notes of this type: discriminators first, then declared order
    /// from root to leaf.
    pub fn field_order(&self, type_path: &str) -> Vec<String> {
        let mut order: Vec<String> = discriminator_fields(type_path)
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect();
        for segment in type_path.split('/') {
            if let Some(def) = self.types.get(segment) {
                for name in &def.field_order {
                    if !order.contains(name) {
                        order.push(name.clone());
                    }
                }
            }
        }
        order
    }

    pub fn options_for_field(&self, type_path: &str, field: &str) -> Vec<String> {
        self.fields_for_type(type_path)
            .get(field)
            .map(|f| f.options.clone())
            .unwrap_or_default()
    }

    /// Paths of types with no subtypes: the types a note can actually have.
    pub fn concrete_type_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        for family in self.type_families() {
            let below = self.descendants(&family);
            if below.is_empty() {
                out.push(family);
                continue;
            }
            out.extend(
                below
                    .into_iter()
                    .filter(|path| self.children(leaf_name(path)).is_empty()),
            );
        }
        out
    }

    /// Root type names.
    pub fn type_families(&self) -> Vec<String> {
        self.types
            .iter()
            .filter(|(_, def)| def.extends.is_none())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Paths of every type below `type_path`.
    pub fn descendants(&self, type_path: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![leaf_name(type_path).to_string()];
        while let Some(name) = stack.pop() {
            for child in self.children(&name) {
                if let Some(path) = self.type_path(child) {
                    out.push(path);
                }
                stack.push(child.to_string());
            }
        }
        out.sort();
        out
    }

    /// Whether `key` is a discriminator key for some type family.
    pub fn is_discriminator_key(&self, key: &str) -> bool {
        key == "type"
            || key
                .strip_suffix("-type")
                .is_some_and(|parent| self.types.contains_key(parent))
    }
}

pub fn leaf_name(type_path: &str) -> &str {
    type_path.rsplit('/').next().unwrap_or(type_path)
}

/// Discriminator fields identifying a type path, in root-to-leaf order.
pub fn discriminator_fields(type_path: &str) -> Frontmatter {
    let mut fields = Frontmatter::new();
    let segments: Vec<&str> = type_path.split('/').filter(|s| !s.is_empty()).collect();
    for (i, segment) in segments.iter().enumerate() {
        let key = if i == 0 {
            "type".to_string()
        } else {
            format!("{}-type", segments[i - 1])
        };
        fields.insert(Value::String(key), Value::String(segment.to_string()));
    }
    fields
}
