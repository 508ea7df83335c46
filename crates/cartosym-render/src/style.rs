//! Boundary to external style-description documents.
//!
//! Symbols only walk their layers and hand each one's attributes to a
//! [`StyleWriter`]; the document format belongs to the writer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::symbol::SymbolType;

/// Flat key/value attributes of a symbol or layer.
pub type StyleProperties = BTreeMap<String, String>;

pub trait StyleWriter {
    fn begin_symbol(&mut self, _symbol_type: SymbolType, _props: &StyleProperties) {}

    fn write_layer(&mut self, layer_type: &str, props: &StyleProperties);

    fn end_symbol(&mut self) {}
}

/// A written layer entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleLayerEntry {
    pub layer_type: String,
    pub properties: StyleProperties,
}

/// A written symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSymbolEntry {
    pub symbol_type: SymbolType,
    pub properties: StyleProperties,
    pub layers: Vec<StyleLayerEntry>,
}

/// In-memory style document, serializable to JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleDocument {
    pub symbols: Vec<StyleSymbolEntry>,
}

impl StyleDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl StyleWriter for StyleDocument {
    fn begin_symbol(&mut self, symbol_type: SymbolType, props: &StyleProperties) {
        self.symbols.push(StyleSymbolEntry {
            symbol_type,
            properties: props.clone(),
            layers: Vec::new(),
        });
    }

    fn write_layer(&mut self, layer_type: &str, props: &StyleProperties) {
        let entry = StyleLayerEntry {
            layer_type: layer_type.to_string(),
            properties: props.clone(),
        };
        match self.symbols.last_mut() {
            Some(symbol) => symbol.layers.push(entry),
            None => log::warn!("Style layer '{}' written outside a symbol, ignored", layer_type),
        }
    }
}
