//! SQLite schema definition.

/// Complete database schema for queue ticket issuance.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Reference Data (read-only to the allocation core)
-- ============================================================================

CREATE TABLE IF NOT EXISTS service_points (
    service_point_id INTEGER PRIMARY KEY,
    local_code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    prefix TEXT CHECK (prefix IS NULL OR length(prefix) BETWEEN 1 AND 2),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS priorities (
    priority_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    prefix TEXT CHECK (prefix IS NULL OR length(prefix) BETWEEN 1 AND 2),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS api_tokens (
    token TEXT PRIMARY KEY,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Patients (upserted by hn on every registration)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    hn TEXT PRIMARY KEY,
    title TEXT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    birth_date TEXT NOT NULL,
    sex TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Daily Counters (one row per service point and service date)
-- ============================================================================

CREATE TABLE IF NOT EXISTS daily_counters (
    service_point_id INTEGER NOT NULL REFERENCES service_points(service_point_id),
    service_date TEXT NOT NULL,
    current_value INTEGER NOT NULL DEFAULT 0 CHECK (current_value >= 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (service_point_id, service_date)
);

-- Counters never move backwards
CREATE TRIGGER IF NOT EXISTS daily_counters_monotonic BEFORE UPDATE ON daily_counters
WHEN new.current_value < old.current_value
BEGIN
    SELECT RAISE(ABORT, 'Daily counters cannot be decremented');
END;

-- ============================================================================
-- Registrations (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS registrations (
    registration_id INTEGER PRIMARY KEY AUTOINCREMENT,
    service_point_id INTEGER NOT NULL REFERENCES service_points(service_point_id),
    service_date TEXT NOT NULL,
    service_time TEXT NOT NULL,
    ticket_code TEXT NOT NULL,
    sequence INTEGER NOT NULL CHECK (sequence >= 1),
    hn TEXT NOT NULL REFERENCES patients(hn),
    vn TEXT NOT NULL,
    priority_id INTEGER,
    his_queue_ref TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (service_point_id, service_date, sequence)
);

CREATE TRIGGER IF NOT EXISTS registrations_no_update BEFORE UPDATE ON registrations
BEGIN
    SELECT RAISE(ABORT, 'Registrations are append-only');
END;

-- Duplicate guard lookup
CREATE INDEX IF NOT EXISTS idx_registrations_visit ON registrations(hn, vn, service_point_id);
CREATE INDEX IF NOT EXISTS idx_registrations_point_date ON registrations(service_point_id, service_date);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO service_points (service_point_id, local_code, name, prefix) VALUES (5, 'CLN01', 'Clinic A', 'M')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO patients (hn, first_name, last_name, birth_date) VALUES ('H1', 'Somchai', 'Jaidee', '1980-01-01')",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_prefix_length_constraint() {
        let conn = setup_conn();

        let result = conn.execute(
            "INSERT INTO priorities (priority_id, name, prefix) VALUES (1, 'Normal', 'ABC')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO priorities (priority_id, name, prefix) VALUES (1, 'Normal', NULL)",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_counter_cannot_decrease() {
        let conn = setup_conn();
        conn.execute(
            "INSERT INTO daily_counters (service_point_id, service_date, current_value) VALUES (5, '2024-01-01', 3)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "UPDATE daily_counters SET current_value = 2 WHERE service_point_id = 5",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "UPDATE daily_counters SET current_value = 4 WHERE service_point_id = 5",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_registrations_append_only() {
        let conn = setup_conn();
        conn.execute(
            r#"INSERT INTO registrations
               (service_point_id, service_date, service_time, ticket_code, sequence, hn, vn, created_at)
               VALUES (5, '2024-01-01', '09:30:00', 'MT001', 1, 'H1', 'V1', '2024-01-01T09:30:00Z')"#,
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE registrations SET ticket_code = 'MT002'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_sequence_unique_per_key() {
        let conn = setup_conn();
        let insert = r#"INSERT INTO registrations
            (service_point_id, service_date, service_time, ticket_code, sequence, hn, vn, created_at)
            VALUES (5, '2024-01-01', '09:30:00', 'MT001', 1, 'H1', ?, '2024-01-01T09:30:00Z')"#;

        conn.execute(insert, ["V1"]).unwrap();
        assert!(conn.execute(insert, ["V2"]).is_err());
    }
}
