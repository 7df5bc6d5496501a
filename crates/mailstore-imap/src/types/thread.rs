//! THREAD response tree (RFC 5256).

/// A node of a thread tree.
///
/// `id` is `None` for the placeholder that groups siblings whose common
/// parent is missing, e.g. `((3)(5))`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadNode {
    /// Message number (UID for `UID THREAD`).
    pub id: Option<u32>,
    /// Replies to this message.
    pub children: Vec<Self>,
}

impl ThreadNode {
    /// Depth-first list of all message numbers under and including this node.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<u32>) {
        if let Some(id) = self.id {
            out.push(id);
        }
        for child in &self.children {
            child.collect(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_depth_first() {
        let node = ThreadNode {
            id: Some(3),
            children: vec![
                ThreadNode {
                    id: Some(6),
                    children: vec![ThreadNode {
                        id: Some(4),
                        children: vec![],
                    }],
                },
                ThreadNode {
                    id: Some(44),
                    children: vec![],
                },
            ],
        };
        assert_eq!(node.ids(), [3, 6, 4, 44]);
    }
}
