use uuid::Uuid;

/// Source of candidate search ids.
///
/// Allocation never fails and has no side effects. Callers must still check
/// the store for an existing record before accepting an id.
pub trait IdAllocator: Send + Sync {
    fn allocate(&self) -> String;
}

/// Random v4 UUIDs rendered in hyphenated form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidAllocator;

impl IdAllocator for UuidAllocator {
    fn allocate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_allocator_produces_parseable_distinct_ids() {
        let allocator = UuidAllocator;
        let ids: HashSet<String> = (0..1000).map(|_| allocator.allocate()).collect();
        assert_eq!(ids.len(), 1000);
        for id in &ids {
            assert_eq!(Uuid::parse_str(id).unwrap().get_version_num(), 4);
        }
    }
}
