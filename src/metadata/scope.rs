//! Lexically scoped table of named types.

use crate::descriptor::TypeDescriptor;
use crate::error::MetadataError;
use std::collections::HashMap;

/// Types declared with `typealias`, `typedef` or as named `struct`/`enum`/`variant`.
///
/// Compound type names are keyed with their keyword (`struct foo`) so they never clash
/// with aliases. A name declared in an inner scope is visible to nested scopes only.
#[derive(Debug)]
pub(crate) struct TypeScope {
    frames: Vec<HashMap<String, TypeDescriptor>>,
}

impl TypeScope {
    pub fn new() -> Self {
        TypeScope {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        // The root frame lives as long as the table
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn declare(&mut self, name: String, ty: TypeDescriptor) -> Result<(), MetadataError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        match frame.get(&name) {
            // Identical redeclarations show up in concatenated metadata streams
            Some(existing) if *existing == ty => Ok(()),
            Some(_) => Err(MetadataError::DuplicateType(name)),
            None => {
                frame.insert(name, ty);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeDescriptor> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    pub fn resolve(&self, name: &str) -> Result<TypeDescriptor, MetadataError> {
        self.lookup(name)
            .cloned()
            .ok_or_else(|| MetadataError::UnknownType(name.to_owned()))
    }
}
