//! Dual Core Library
//!
//! Port bookkeeping for running many working copies ("contexts") of one
//! repository side by side:
//! - A shared on-disk registry guarded by a cross-process file lock
//! - Deterministic per-service port allocation
//! - Conflict and health analysis over the registry
//!
//! # Quick Start
//!
//! ```no_run
//! use dual_core::{find_next_available_base_port, Config, RegistryStore};
//!
//! let config = Config::with_services(["api", "web"]);
//! let mut store = RegistryStore::load("/work/app").unwrap();
//!
//! let base = find_next_available_base_port(store.registry(), config.num_services()).unwrap();
//! store.set_context("/work/app", "main", base, "/work/app");
//! store.save().unwrap();
//! store.close().unwrap();
//! ```
//!
//! # Ports
//!
//! Services are ranked by name, so ports never depend on config order:
//!
//! ```
//! use dual_core::calculate_all_ports;
//!
//! let ports = calculate_all_ports(4100, ["web", "api"]).unwrap();
//! assert_eq!(ports["api"], 4101);
//! assert_eq!(ports["web"], 4102);
//! ```

mod config;
mod conflict;
mod error;
mod health;
mod lock;
mod ports;
mod process;
mod registry;
mod types;

pub use config::{find_project_root, Config, Service, CONFIG_FILE, CONFIG_VERSION};
pub use conflict::{
    check_context_port_conflict, check_port_range_overlap, check_service_port_in_use,
    find_duplicate_base_ports, is_port_in_use, BasePortConflict, ContextInfo, PortRangeOverlap,
    ServicePortStatus,
};
pub use error::{DualError, Result};
pub use health::{check_health, HealthReport, OrphanedContext};
pub use lock::{lock_path, RegistryLock, LOCK_TIMEOUT, REGISTRY_FILE, STATE_DIR};
pub use ports::{
    calculate_all_ports, calculate_port, find_next_available_base_port,
    find_next_available_base_port_from, port_for_service, ports_for_context, service_index,
    validate_base_port, DEFAULT_BASE_PORT, MAX_PORT, MIN_PORT, PORT_INCREMENT,
};
pub use process::{
    default_inspector, get_process_using_port, parse_lsof_output, parse_netstat_output,
    parse_ps_output, parse_tasklist_output, LsofInspector, NetstatInspector, PortInspector,
    ProcessInfo,
};
pub use registry::{canonical_project_id, registry_path, RegistryStore};
pub use types::{Context, Project, Registry};
