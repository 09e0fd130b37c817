use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};

/// Visibility policy derived from the authenticated actor's business-type
/// partition.
///
/// Admin actors see every partition; everyone else only sees rows tagged
/// with their own business type. Applied at the repository layer so list
/// and detail queries cannot forget the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessScope {
    /// No partition restriction (admin)
    All,
    /// Restricted to a single business-type tag
    Partition(String),
}

impl BusinessScope {
    pub fn for_actor(is_admin: bool, business_type: &str) -> Self {
        if is_admin {
            BusinessScope::All
        } else {
            BusinessScope::Partition(business_type.to_string())
        }
    }

    /// Narrow a select on any entity carrying a business-type column.
    pub fn apply<E>(&self, query: Select<E>, column: E::Column) -> Select<E>
    where
        E: EntityTrait,
    {
        match self {
            BusinessScope::All => query,
            BusinessScope::Partition(tag) => query.filter(column.eq(tag.clone())),
        }
    }

    /// The partition a created row should be tagged with, given what the
    /// actor asked for. Admins may choose any partition; everyone else is
    /// pinned to their own.
    pub fn resolve_tag(&self, requested: Option<&str>, own_tag: &str) -> String {
        match self {
            BusinessScope::All => requested.unwrap_or(own_tag).to_string(),
            BusinessScope::Partition(tag) => tag.clone(),
        }
    }

    /// Whether a row tagged `tag` is visible under this scope.
    pub fn allows(&self, tag: &str) -> bool {
        match self {
            BusinessScope::All => true,
            BusinessScope::Partition(own) => own == tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_scope_sees_everything() {
        let scope = BusinessScope::for_actor(true, "admin");
        assert_eq!(scope, BusinessScope::All);
        assert!(scope.allows("oil"));
        assert!(scope.allows("fast_moving"));
    }

    #[test]
    fn partition_scope_is_pinned() {
        let scope = BusinessScope::for_actor(false, "oil");
        assert!(scope.allows("oil"));
        assert!(!scope.allows("fast_moving"));
        // A non-admin cannot create rows in another partition.
        assert_eq!(scope.resolve_tag(Some("fast_moving"), "oil"), "oil");
    }

    #[test]
    fn admin_may_choose_partition_on_create() {
        let scope = BusinessScope::for_actor(true, "admin");
        assert_eq!(scope.resolve_tag(Some("fast_moving"), "admin"), "fast_moving");
        assert_eq!(scope.resolve_tag(None, "admin"), "admin");
    }
}
