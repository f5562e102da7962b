use std::collections::BTreeSet;

use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::models::CaseRecord;
use crate::source;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Upserts every row of a case file. A repeated (district, date) replaces the
/// stored counters.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let records = source::read_cases(csv_path, &BTreeSet::new())?;
    let mut written = 0usize;

    for record in &records {
        let result = sqlx::query(
            r#"
            INSERT INTO district_risk.case_records
            (id, state, district, report_date, confirmed, recovered, deceased, tested)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (district, report_date) DO UPDATE
            SET state = EXCLUDED.state,
                confirmed = EXCLUDED.confirmed,
                recovered = EXCLUDED.recovered,
                deceased = EXCLUDED.deceased,
                tested = EXCLUDED.tested,
                imported_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.state)
        .bind(&record.district)
        .bind(record.date)
        .bind(record.confirmed)
        .bind(record.recovered)
        .bind(record.deceased)
        .bind(record.tested)
        .execute(pool)
        .await?;

        written += result.rows_affected() as usize;
    }

    info!(rows = written, path = %csv_path.display(), "imported case records");
    Ok(written)
}

/// Case rows for the districts of interest, ordered by district and date.
/// An empty set returns every district.
pub async fn fetch_cases(
    pool: &PgPool,
    districts: &BTreeSet<String>,
) -> anyhow::Result<Vec<CaseRecord>> {
    let mut query = String::from(
        "SELECT state, district, report_date, confirmed, recovered, deceased, tested \
         FROM district_risk.case_records",
    );

    if !districts.is_empty() {
        query.push_str(" WHERE district = ANY($1)");
    }
    query.push_str(" ORDER BY district, report_date");

    let mut rows = sqlx::query(&query);
    if !districts.is_empty() {
        let names: Vec<String> = districts.iter().cloned().collect();
        rows = rows.bind(names);
    }

    let records = rows.fetch_all(pool).await?;
    let mut cases = Vec::with_capacity(records.len());

    for row in records {
        cases.push(CaseRecord {
            state: row.get("state"),
            district: row.get("district"),
            date: row.get("report_date"),
            confirmed: row.get("confirmed"),
            recovered: row.get("recovered"),
            deceased: row.get("deceased"),
            tested: row.get("tested"),
        });
    }

    Ok(cases)
}
