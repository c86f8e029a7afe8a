use std::collections::{HashMap, HashSet};

use getset::Getters;
use indexmap::IndexMap;
use log::{debug, warn};

use super::{ContigDeclaration, FieldDeclaration, Header, SimpleDeclaration};
use crate::grammar::{grammar, Grammar};
use crate::types::{MetaKey, VcfVersion};

/// Read-only lookup structure derived from a [`Header`]; records are validated against it.
/// Derive a fresh one after every header change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct Registry {
    #[getset(skip)]
    version: VcfVersion,
    contig: IndexMap<String, Option<u64>>,
    info: HashMap<String, FieldDeclaration>,
    format: HashMap<String, FieldDeclaration>,
    filter: HashSet<String>,
    alt: HashSet<String>,
    sample: HashSet<String>,
    sample_names: Vec<String>,
}

impl Registry {
    pub fn version(&self) -> VcfVersion {
        self.version
    }

    pub fn grammar(&self) -> &'static Grammar {
        grammar(self.version)
    }

    pub fn has_contigs(&self) -> bool {
        !self.contig.is_empty()
    }
}

fn ids<'a>(header: &'a Header, kind: MetaKey) -> impl Iterator<Item = SimpleDeclaration> + 'a {
    header
        .declarations(kind)
        .iter()
        .filter_map(SimpleDeclaration::from_declaration)
}

fn fields(header: &Header, kind: MetaKey, grammar: &Grammar) -> HashMap<String, FieldDeclaration> {
    header
        .declarations(kind)
        .iter()
        .filter_map(|declaration| {
            let field = FieldDeclaration::from_declaration(declaration, grammar);
            if field.is_none() {
                warn!(
                    "skipping malformed {} declaration {:?}",
                    kind,
                    declaration.id().unwrap_or("")
                );
            }
            field
        })
        .map(|field| (field.id().clone(), field))
        .collect()
}

impl Header {
    /// Derive the lookup index from the current header. Declarations that cannot be typed
    /// (which validation would reject) are left out.
    pub fn extract_registry(&self) -> Registry {
        let version = self.version();
        let grammar = grammar(version);
        debug!("building registry for {}", version);
        Registry {
            version,
            contig: self
                .contig()
                .iter()
                .filter_map(ContigDeclaration::from_declaration)
                .map(|contig| (contig.id().clone(), contig.length()))
                .collect(),
            info: fields(self, MetaKey::Info, grammar),
            format: fields(self, MetaKey::Format, grammar),
            filter: ids(self, MetaKey::Filter).map(|d| d.id().clone()).collect(),
            alt: ids(self, MetaKey::Alt).map(|d| d.id().clone()).collect(),
            sample: ids(self, MetaKey::Sample).map(|d| d.id().clone()).collect(),
            sample_names: self.sample_names().to_vec(),
        }
    }
}
