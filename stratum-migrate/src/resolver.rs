//! Migration discovery.

use crate::error::MigrateResult;
use crate::migration::ResolvedMigration;
use crate::ordering::sort_resolved;

/// Discovers migrations from source.
#[async_trait::async_trait]
pub trait MigrationResolver: Send + Sync {
    /// Every migration currently available, rebuilt on each call.
    async fn resolve(&self) -> MigrateResult<Vec<ResolvedMigration>>;
}

/// A fixed set of migrations, returned in canonical order.
#[async_trait::async_trait]
impl MigrationResolver for Vec<ResolvedMigration> {
    async fn resolve(&self) -> MigrateResult<Vec<ResolvedMigration>> {
        let mut migrations = self.clone();
        sort_resolved(&mut migrations);
        Ok(migrations)
    }
}

/// Several resolvers combined, results merged into canonical order.
#[derive(Default)]
pub struct CompositeResolver {
    resolvers: Vec<Box<dyn MigrationResolver>>,
}

impl CompositeResolver {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resolver.
    pub fn with(mut self, resolver: impl MigrationResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }
}

#[async_trait::async_trait]
impl MigrationResolver for CompositeResolver {
    async fn resolve(&self) -> MigrateResult<Vec<ResolvedMigration>> {
        let mut migrations = Vec::new();
        for resolver in &self.resolvers {
            migrations.extend(resolver.resolve().await?);
        }
        sort_resolved(&mut migrations);
        Ok(migrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::MigrationKind;
    use crate::version::MigrationVersion;

    fn resolved(version: &str, script: &str) -> ResolvedMigration {
        ResolvedMigration::new(
            Some(MigrationVersion::parse(version).unwrap()),
            "test",
            script,
            Some(1),
            MigrationKind::SQL,
        )
    }

    #[tokio::test]
    async fn test_composite_merges_in_order() {
        let composite = CompositeResolver::new()
            .with(vec![resolved("2", "V2__b.sql")])
            .with(vec![resolved("1", "V1__a.sql"), resolved("3", "V3__c.sql")]);

        let scripts: Vec<_> = composite
            .resolve()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.script)
            .collect();
        assert_eq!(scripts, vec!["V1__a.sql", "V2__b.sql", "V3__c.sql"]);
    }
}
