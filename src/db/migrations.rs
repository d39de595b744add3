use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts, applied in order. Entry `n` upgrades `user_version` n to n + 1.
const MIGRATIONS: &[(&str, &str)] = &[(
    "schema_v1.sql",
    include_str!("schemas/schema_v1.sql"),
)];

pub fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

fn stored_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read analysis store schema version")
}

/// Bring the analysis store up to [`schema_version`] in a single transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let target = schema_version();
    let found = stored_version(conn)?;

    if found < 0 {
        bail!("analysis store has invalid schema version {found}");
    }
    if found > target {
        bail!("analysis store has schema v{found}, this build only knows up to v{target}");
    }
    if found == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to begin schema upgrade")?;
    for (index, (name, script)) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply {name} (v{})", index + 1))?;
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to record analysis store schema version")?;
    tx.commit().context("failed to commit schema upgrade")?;

    info!("Upgraded analysis store schema from v{found} to v{target}");
    Ok(())
}
