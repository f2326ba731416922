use serde_json::Value;

/// Recursive merge where the source wins on conflicts.
///
/// Used to layer step seeds: blank defaults <- template values <- known data.
pub trait MergeFrom {
    /// Merge from a source of the same type.
    fn merge_from(&mut self, other: &Self);
}

impl MergeFrom for Value {
    fn merge_from(&mut self, other: &Self) {
        match (self, other) {
            (Value::Object(this), Value::Object(other)) => {
                for (k, v) in other {
                    if let Some(existing) = this.get_mut(k) {
                        existing.merge_from(v);
                    } else {
                        this.insert(k.clone(), v.clone());
                    }
                }
            }
            (this, other) => *this = other.clone(),
        }
    }
}

/// Fold several layers into one value, lowest precedence first.
pub fn layered<'a>(layers: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut out = Value::Object(Default::default());
    for layer in layers {
        out.merge_from(layer);
    }
    out
}
