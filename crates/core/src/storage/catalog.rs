use crate::domain::card::{
    CapPeriod, CardNetwork, CardProduct, EarningRule, RewardProgram, RewardUnit, SpendCap,
};
use crate::domain::catalog::{Catalog, CatalogDraft};
use anyhow::Context;
use uuid::Uuid;

pub async fn persist_success(
    pool: &sqlx::PgPool,
    catalog: &Catalog,
    source: &str,
    raw_feed: Option<serde_json::Value>,
) -> anyhow::Result<Uuid> {
    let snapshot_id = Uuid::new_v4();
    let fetched_at = chrono::Utc::now();

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO catalog_snapshots (id, fetched_at, source, status, error, raw_feed) \
         VALUES ($1, $2, $3, 'success', NULL, $4)",
    )
    .bind(snapshot_id)
    .bind(fetched_at)
    .bind(source)
    .bind(raw_feed)
    .execute(&mut *tx)
    .await
    .context("insert catalog_snapshots failed")?;

    for program in catalog.programs.values() {
        insert_program(&mut tx, snapshot_id, program).await?;
    }
    for card in &catalog.cards {
        insert_card(&mut tx, snapshot_id, card).await?;
    }
    for rules in catalog.rules_by_card.values() {
        for rule in rules {
            insert_rule(&mut tx, snapshot_id, rule).await?;
        }
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(snapshot_id)
}

pub async fn persist_failure(
    pool: &sqlx::PgPool,
    source: &str,
    error: &str,
    raw_feed: Option<serde_json::Value>,
) -> anyhow::Result<Uuid> {
    let snapshot_id = Uuid::new_v4();
    let fetched_at = chrono::Utc::now();

    sqlx::query(
        "INSERT INTO catalog_snapshots (id, fetched_at, source, status, error, raw_feed) \
         VALUES ($1, $2, $3, 'error', $4, $5)",
    )
    .bind(snapshot_id)
    .bind(fetched_at)
    .bind(source)
    .bind(error)
    .bind(raw_feed)
    .execute(pool)
    .await
    .context("insert error catalog_snapshots failed")?;

    Ok(snapshot_id)
}

/// Newest successful snapshot, reassembled and re-validated so the API only
/// ever serves a catalog that passes the load-time gate.
pub async fn fetch_latest(pool: &sqlx::PgPool) -> anyhow::Result<Option<(Uuid, String, Catalog)>> {
    let row: Option<(Uuid, String)> = sqlx::query_as(
        "SELECT id, source FROM catalog_snapshots \
         WHERE status = 'success' \
         ORDER BY fetched_at DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    let Some((snapshot_id, source)) = row else {
        return Ok(None);
    };

    let catalog = fetch_snapshot_catalog(pool, snapshot_id).await?;
    Ok(Some((snapshot_id, source, catalog)))
}

async fn fetch_snapshot_catalog(pool: &sqlx::PgPool, snapshot_id: Uuid) -> anyhow::Result<Catalog> {
    let program_rows: Vec<(String, String, String, f64)> = sqlx::query_as(
        "SELECT program_id, name, unit, cents_per_unit FROM reward_programs \
         WHERE snapshot_id = $1 \
         ORDER BY program_id ASC",
    )
    .bind(snapshot_id)
    .fetch_all(pool)
    .await?;

    let mut programs = Vec::with_capacity(program_rows.len());
    for (id, name, unit, cents_per_unit) in program_rows {
        programs.push(RewardProgram {
            id,
            name,
            unit: RewardUnit::parse(&unit)
                .with_context(|| format!("invalid reward unit in snapshot {snapshot_id}"))?,
            cents_per_unit,
        });
    }

    let card_rows: Vec<(String, String, String, String, f64, String, f64)> = sqlx::query_as(
        "SELECT card_id, name, issuer, network, annual_fee, program_id, base_multiplier \
         FROM card_products \
         WHERE snapshot_id = $1 \
         ORDER BY card_id ASC",
    )
    .bind(snapshot_id)
    .fetch_all(pool)
    .await?;

    let mut cards = Vec::with_capacity(card_rows.len());
    for (id, name, issuer, network, annual_fee, program_id, base_multiplier) in card_rows {
        cards.push(CardProduct {
            id,
            name,
            issuer,
            network: CardNetwork::parse(&network)
                .with_context(|| format!("invalid card network in snapshot {snapshot_id}"))?,
            annual_fee,
            program_id,
            base_multiplier,
        });
    }

    let rule_rows: Vec<(String, Option<String>, f64, Option<f64>, Option<String>, bool)> =
        sqlx::query_as(
            "SELECT card_id, category, multiplier, cap_amount, cap_period, rotating \
             FROM earning_rules \
             WHERE snapshot_id = $1 \
             ORDER BY id ASC",
        )
        .bind(snapshot_id)
        .fetch_all(pool)
        .await?;

    let mut rules = Vec::with_capacity(rule_rows.len());
    for (card_id, category, multiplier, cap_amount, cap_period, rotating) in rule_rows {
        let cap = match (cap_amount, cap_period) {
            (Some(amount), Some(period)) => Some(SpendCap {
                amount,
                period: CapPeriod::parse(&period)
                    .with_context(|| format!("invalid cap period in snapshot {snapshot_id}"))?,
            }),
            (None, None) => None,
            _ => anyhow::bail!(
                "snapshot {snapshot_id} has a rule for card {card_id} with a partial cap"
            ),
        };
        rules.push(EarningRule {
            card_id,
            category,
            multiplier,
            cap,
            rotating,
        });
    }

    CatalogDraft {
        programs,
        cards,
        rules,
    }
    .validate_and_into_catalog()
    .with_context(|| format!("stored snapshot {snapshot_id} failed validation"))
}

async fn insert_program(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    snapshot_id: Uuid,
    program: &RewardProgram,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO reward_programs (snapshot_id, program_id, name, unit, cents_per_unit) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(snapshot_id)
    .bind(&program.id)
    .bind(&program.name)
    .bind(program.unit.as_str())
    .bind(program.cents_per_unit)
    .execute(&mut **tx)
    .await
    .context("insert reward_programs failed")?;

    Ok(())
}

async fn insert_card(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    snapshot_id: Uuid,
    card: &CardProduct,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO card_products \
         (snapshot_id, card_id, name, issuer, network, annual_fee, program_id, base_multiplier) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(snapshot_id)
    .bind(&card.id)
    .bind(&card.name)
    .bind(&card.issuer)
    .bind(card.network.as_str())
    .bind(card.annual_fee)
    .bind(&card.program_id)
    .bind(card.base_multiplier)
    .execute(&mut **tx)
    .await
    .context("insert card_products failed")?;

    Ok(())
}

async fn insert_rule(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    snapshot_id: Uuid,
    rule: &EarningRule,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO earning_rules \
         (snapshot_id, card_id, category, multiplier, cap_amount, cap_period, rotating) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(snapshot_id)
    .bind(&rule.card_id)
    .bind(&rule.category)
    .bind(rule.multiplier)
    .bind(rule.cap.map(|c| c.amount))
    .bind(rule.cap.map(|c| c.period.as_str()))
    .bind(rule.rotating)
    .execute(&mut **tx)
    .await
    .context("insert earning_rules failed")?;

    Ok(())
}
