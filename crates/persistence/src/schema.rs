//! ScyllaDB schema creation
//!
//! Timestamps are epoch milliseconds in BIGINT columns. Nested collections
//! (patients, history, doctors, feedback, refs) are JSON text.

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables and secondary indexes
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    let statements = [
        (
            "organizations",
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {}.organizations (
            id TEXT,
            name TEXT,
            active BOOLEAN,
            phone_number_id TEXT,
            legacy_phone_number_id TEXT,
            config_json TEXT,
            PRIMARY KEY (id)
        )"#,
                keyspace
            ),
        ),
        (
            "organizations_phone_idx",
            format!(
                "CREATE INDEX IF NOT EXISTS organizations_phone_idx ON {}.organizations (phone_number_id)",
                keyspace
            ),
        ),
        (
            "organizations_legacy_phone_idx",
            format!(
                "CREATE INDEX IF NOT EXISTS organizations_legacy_phone_idx ON {}.organizations (legacy_phone_number_id)",
                keyspace
            ),
        ),
        (
            "contacts",
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {}.contacts (
            organization_id TEXT,
            phone TEXT,
            name TEXT,
            bot_enabled BOOLEAN,
            registered BOOLEAN,
            last_seen BIGINT,
            created_at BIGINT,
            history_json TEXT,
            patients_json TEXT,
            PRIMARY KEY ((organization_id), phone)
        )"#,
                keyspace
            ),
        ),
        (
            "contacts_phone_idx",
            format!(
                "CREATE INDEX IF NOT EXISTS contacts_phone_idx ON {}.contacts (phone)",
                keyspace
            ),
        ),
        (
            "chat_messages",
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {}.chat_messages (
            organization_id TEXT,
            phone TEXT,
            created_at BIGINT,
            message_id UUID,
            direction TEXT,
            from_addr TEXT,
            to_addr TEXT,
            kind TEXT,
            body TEXT,
            extra_json TEXT,
            PRIMARY KEY ((organization_id, phone), created_at, message_id)
        ) WITH CLUSTERING ORDER BY (created_at ASC, message_id ASC)"#,
                keyspace
            ),
        ),
        (
            "appointments",
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {}.appointments (
            organization_id TEXT,
            appointment_id TEXT,
            contact_phone TEXT,
            doctor_id TEXT,
            doctor_name TEXT,
            patient_name TEXT,
            patient_age INT,
            patient_gender TEXT,
            specialty TEXT,
            appointment_date TEXT,
            appointment_time TEXT,
            reason TEXT,
            status TEXT,
            flow_token TEXT,
            feedback_json TEXT,
            created_at BIGINT,
            PRIMARY KEY ((organization_id), appointment_id)
        )"#,
                keyspace
            ),
        ),
        (
            "appointments_flow_token_idx",
            format!(
                "CREATE INDEX IF NOT EXISTS appointments_flow_token_idx ON {}.appointments (flow_token)",
                keyspace
            ),
        ),
        (
            "support_tickets",
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {}.support_tickets (
            organization_id TEXT,
            ticket_id TEXT,
            contact_phone TEXT,
            description TEXT,
            urgency TEXT,
            category TEXT,
            status TEXT,
            created_at BIGINT,
            PRIMARY KEY ((organization_id), ticket_id)
        )"#,
                keyspace
            ),
        ),
        (
            "checkins",
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {}.checkins (
            organization_id TEXT,
            checkin_id TEXT,
            contact_phone TEXT,
            created_at BIGINT,
            PRIMARY KEY ((organization_id), checkin_id)
        )"#,
                keyspace
            ),
        ),
        (
            "notifications",
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {}.notifications (
            organization_id TEXT,
            notification_id UUID,
            from_addr TEXT,
            message TEXT,
            kind TEXT,
            created_at BIGINT,
            seen BOOLEAN,
            refs_json TEXT,
            PRIMARY KEY ((organization_id), notification_id)
        )"#,
                keyspace
            ),
        ),
    ];

    for (name, statement) in statements {
        session.query_unpaged(statement, &[]).await.map_err(|e| {
            PersistenceError::SchemaError(format!("Failed to create {}: {}", name, e))
        })?;
    }

    Ok(())
}
