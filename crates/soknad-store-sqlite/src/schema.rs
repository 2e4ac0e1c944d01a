//! SQL schema for the søknad SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS soknader (
    soknad_id             TEXT PRIMARY KEY,
    ident                 TEXT NOT NULL,
    tilstand              TEXT NOT NULL,   -- wire name, e.g. 'Påbegynt'
    spraak                TEXT NOT NULL,
    opprettet             TEXT NOT NULL,   -- ISO 8601 UTC
    innsendt_tidspunkt    TEXT,
    sist_endret_av_bruker TEXT NOT NULL,
    prosessnavn           TEXT,
    prosessversjon        INTEGER,
    dokumentkrav          TEXT NOT NULL DEFAULT '{\"krav\":[]}',  -- JSON
    behandlede_behov      TEXT NOT NULL DEFAULT '[]',             -- JSON uuid list
    versjon               INTEGER NOT NULL DEFAULT 1              -- optimistic lock
);

CREATE TABLE IF NOT EXISTS innsendinger (
    innsending_id   TEXT PRIMARY KEY,
    soknad_id       TEXT NOT NULL REFERENCES soknader(soknad_id) ON DELETE CASCADE,
    forelder_id     TEXT,            -- NULL for the primary innsending
    ident           TEXT NOT NULL,
    innsending_type TEXT NOT NULL,   -- 'ny_innsending' | 'ettersending'
    tilstand        TEXT NOT NULL,
    innsendt        TEXT NOT NULL,
    journalpost_id  TEXT,
    skjemakode      TEXT NOT NULL,
    hoveddokument   TEXT,                        -- JSON Dokument
    dokumenter      TEXT NOT NULL DEFAULT '[]'   -- JSON Dokument list
);

-- Activity entries are strictly append-only.
-- No UPDATE or DELETE is ever issued against these two tables.
CREATE TABLE IF NOT EXISTS aktiviteter (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    ident            TEXT NOT NULL,
    alvorlighetsgrad TEXT NOT NULL,   -- 'info' | 'varsel' | 'feil' | 'alvorlig'
    melding          TEXT NOT NULL,
    tidsstempel      TEXT NOT NULL,
    kontekster       TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS behov (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    ident      TEXT NOT NULL,
    typ        TEXT NOT NULL,   -- wire name, e.g. 'NySøknad'
    detaljer   TEXT NOT NULL DEFAULT '{}',
    kontekster TEXT NOT NULL DEFAULT '[]'
);

-- Single-row advisory lock for the janitor, claimed with a conditional
-- UPDATE so at most one instance purges at a time.
CREATE TABLE IF NOT EXISTS janitor_laas (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    laast_av        TEXT,
    laast_tidspunkt TEXT
);
INSERT OR IGNORE INTO janitor_laas (id, laast_av, laast_tidspunkt)
    VALUES (1, NULL, NULL);

CREATE INDEX IF NOT EXISTS soknader_ident_idx          ON soknader(ident);
CREATE INDEX IF NOT EXISTS soknader_tilstand_idx       ON soknader(tilstand);
CREATE INDEX IF NOT EXISTS innsendinger_soknad_idx     ON innsendinger(soknad_id);
CREATE INDEX IF NOT EXISTS innsendinger_journalpost_idx
    ON innsendinger(journalpost_id);

PRAGMA user_version = 1;
";
