//! SQL schema for the sbcheck SQLite store.
//!
//! Executed once at connection startup. Foreign keys are enforced, so a
//! dependent row can never point at a missing parent; the cascades that
//! keep it that way live in [`crate::cascade`].

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS nights (
    nightid INTEGER PRIMARY KEY,
    date    TEXT    NOT NULL UNIQUE,   -- YYYY-MM-DD, UT
    nframes INTEGER NOT NULL
);

-- One row per detector-quadrant readout.
CREATE TABLE IF NOT EXISTS obs (
    pid         INTEGER PRIMARY KEY,
    nightid     INTEGER NOT NULL REFERENCES nights(nightid),
    infobits    INTEGER,
    field       INTEGER,
    ccdid       INTEGER,
    qid         INTEGER,
    rcid        INTEGER,
    fid         INTEGER,
    filtercode  TEXT,
    expid       INTEGER,
    obsdate     TEXT,
    obsjd       REAL    NOT NULL,
    filefracday INTEGER,
    seeing      REAL,
    airmass     REAL,
    moonillf    REAL,
    maglimit    REAL,
    crpix1      REAL,
    crpix2      REAL,
    crval1      REAL,
    crval2      REAL,
    cd11        REAL,
    cd12        REAL,
    cd21        REAL,
    cd22        REAL,
    ra          REAL,
    dec         REAL,
    ra1         REAL,
    dec1        REAL,
    ra2         REAL,
    dec2        REAL,
    ra3         REAL,
    dec3        REAL,
    ra4         REAL,
    dec4        REAL
);

-- Ephemeris samples are only ever deleted and re-inserted, never updated.
CREATE TABLE IF NOT EXISTS eph (
    desg      TEXT NOT NULL,
    jd        REAL NOT NULL,
    ra        REAL,
    dec       REAL,
    dra       REAL,
    ddec      REAL,
    vmag      REAL,
    retrieved TEXT NOT NULL,           -- RFC 3339 UTC
    UNIQUE (desg, jd)
);

CREATE TABLE IF NOT EXISTS found (
    foundid       INTEGER PRIMARY KEY,
    desg          TEXT    NOT NULL,
    obsjd         REAL    NOT NULL,
    ra            REAL,
    dec           REAL,
    dra           REAL,
    ddec          REAL,
    ra3sig        REAL,
    dec3sig       REAL,
    vmag          REAL,
    rh            REAL,
    rdot          REAL,
    delta         REAL,
    phase         REAL,
    selong        REAL,
    sangle        REAL,
    vangle        REAL,
    trueanomaly   REAL,
    tmtp          REAL,
    pid           INTEGER NOT NULL REFERENCES obs(pid),
    x             INTEGER,
    y             INTEGER,
    retrieved     TEXT    NOT NULL,
    archivefile   TEXT,                -- relative to the cutout root
    sci_sync_date TEXT,
    sciimg        INTEGER NOT NULL DEFAULT 0,
    mskimg        INTEGER NOT NULL DEFAULT 0,
    scipsf        INTEGER NOT NULL DEFAULT 0,
    diffimg       INTEGER NOT NULL DEFAULT 0,
    diffpsf       INTEGER NOT NULL DEFAULT 0,
    UNIQUE (desg, pid)
);

CREATE TABLE IF NOT EXISTS projections (
    foundid   INTEGER PRIMARY KEY REFERENCES found(foundid),
    vangleimg INTEGER NOT NULL DEFAULT 0,
    sangleimg INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS stacks (
    foundid   INTEGER PRIMARY KEY REFERENCES found(foundid),
    stackfile TEXT,                    -- relative to the stack root
    stacked   INTEGER NOT NULL DEFAULT 0
);

-- Append-only; written only by the delete cascade.
CREATE TABLE IF NOT EXISTS stale_files (
    path        TEXT NOT NULL,         -- 'cutout path' | 'stack path'
    archivefile TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS obs_night_idx ON obs(nightid);
CREATE INDEX IF NOT EXISTS obs_jd_idx    ON obs(obsjd);
CREATE INDEX IF NOT EXISTS eph_jd_idx    ON eph(jd);
CREATE INDEX IF NOT EXISTS found_pid_idx ON found(pid);

PRAGMA user_version = 1;
";
