//! supatool-schema
//!
//! Schema extraction and local/remote reconciliation for Postgres/Supabase
//! projects, plus code generators driven by a YAML data model.
//!
//! # Features
//!
//! - **Extraction**: Introspect tables, views, RLS policies, functions, triggers,
//!   cron jobs and custom types into one SQL file per object, with `index.md`
//!   and `llms.txt` catalogs
//! - **Sync**: Compare a directory of table files with the live database and
//!   overwrite, migrate or report each table
//! - **Generators**: TypeScript types, supabase-js CRUD helpers, Markdown docs,
//!   table DDL and RLS SQL from a model YAML
//!
//! # Example
//!
//! ```ignore
//! use supatool_schema::{ConcurrencyLimit, ScriptedConfirmer, SyncEngine, SyncOptions};
//!
//! let options = SyncOptions::new("supabase/schemas");
//! let mut confirmer = ScriptedConfirmer::default();
//! let mut on_event = |event| println!("{event:?}");
//! let report = SyncEngine::new(&options, &mut on_event)
//!     .run(&client, &["public".to_string()], ConcurrencyLimit::default(), &mut confirmer)
//!     .await?;
//! println!("{} tables", report.outcomes.len());
//! ```

pub mod batch;
pub mod client;
pub mod diff;
pub mod error;
pub mod extract;
pub mod generate;
pub mod indexer;
pub mod introspect;
pub mod local;
pub mod migration;
pub mod model;
pub mod normalize;
pub mod object;
pub mod reconcile;
pub mod sync;
pub mod writer;

pub use batch::ConcurrencyLimit;
pub use client::{IntrospectClient, RowExt};
pub use error::{SchemaError, SchemaResult};
pub use generate::{GenKind, GeneratedFile};
pub use introspect::{ExtractScope, RemoteTables, fetch_definitions, fetch_sync_tables};
pub use local::{LocalSchemaFile, read_local_schemas};
pub use model::Model;
pub use normalize::{TablePattern, comparison_key, normalize_ddl};
pub use object::{FALLBACK_TIMESTAMP, ObjectKind, SchemaObject};
pub use reconcile::{Verdict, decide, reconcile};
pub use sync::{SyncEngine, SyncEvent, SyncOptions, SyncReport, TableOutcome};
pub use writer::{Confirmation, Confirmer, Prompt, ScriptedConfirmer, SyncSession};
