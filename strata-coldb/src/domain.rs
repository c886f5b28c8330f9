use parking_lot::RwLock;
use std::collections::HashMap;
use strata_base::{err, ErrorKind, Result};

/// The ordered list of labels a categorical vector's codes index into.
///
/// One domain is shared by every chunk (and every append buffer) of a
/// vector. While open, unseen labels are added in first-seen order. Once
/// frozen, unseen labels are a domain error. A vector's domain is frozen
/// when the vector is finalized.
#[derive(Debug, Default)]
pub struct Domain {
    inner: RwLock<DomainInner>,
}

#[derive(Debug, Default)]
struct DomainInner {
    labels: Vec<String>,
    codes: HashMap<String, u32>,
    frozen: bool,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A domain fixed up front, e.g. from a declared schema.
    pub fn frozen<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Result<Self> {
        let mut inner = DomainInner::default();
        for label in labels {
            let label = label.into();
            if inner.codes.contains_key(&label) {
                return Err(err(
                    ErrorKind::Domain,
                    format!("duplicate domain label {:?}", label),
                ));
            }
            inner.codes.insert(label.clone(), inner.labels.len() as u32);
            inner.labels.push(label);
        }
        inner.frozen = true;
        Ok(Domain {
            inner: RwLock::new(inner),
        })
    }

    pub fn code_for(&self, label: &str) -> Result<u32> {
        if let Some(code) = self.inner.read().codes.get(label) {
            return Ok(*code);
        }
        let mut inner = self.inner.write();
        if let Some(code) = inner.codes.get(label) {
            return Ok(*code);
        }
        if inner.frozen {
            return Err(err(
                ErrorKind::Domain,
                format!("label {:?} is not in the frozen domain", label),
            ));
        }
        if inner.labels.len() >= i32::MAX as usize {
            return Err(err(ErrorKind::Domain, "domain is full"));
        }
        let code = inner.labels.len() as u32;
        inner.codes.insert(label.to_string(), code);
        inner.labels.push(label.to_string());
        Ok(code)
    }

    pub fn freeze(&self) {
        self.inner.write().frozen = true;
    }

    pub fn label(&self, code: u32) -> Option<String> {
        self.inner.read().labels.get(code as usize).cloned()
    }

    pub fn labels(&self) -> Vec<String> {
        self.inner.read().labels.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
