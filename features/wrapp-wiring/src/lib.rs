//! Wrapp Wiring compiles a catalog of declared components into a static wiring plan.
//!
//! The planner runs once at build time: it decides which components are enabled in an
//! environment, binds every dependency to exactly one provider and orders construction so
//! that hard dependencies are always built first. Code emission consumes the resulting
//! [`WiringPlan`]; nothing is resolved at runtime.
//!
//! # Examples
//!
//! ```rust
//! use wrapp_wiring::{plan, Catalog, ComponentDeclaration, DependencySpec, Environment};
//!
//! let catalog = Catalog::builder()
//!     .add(
//!         ComponentDeclaration::new("app.OrderService", "orderService")
//!             .constructor(vec![DependencySpec::direct("app.Repository")]),
//!     )
//!     .add(ComponentDeclaration::new("app.PgRepository", "repository").implements("app.Repository"))
//!     .build();
//!
//! let plan = plan(&catalog, &Environment::new()).unwrap();
//! let order: Vec<_> = plan.eager_steps().map(|step| step.component.as_str()).collect();
//! assert_eq!(order, vec!["repository", "orderService"]);
//! ```
//!
//! Wrapp Wiring consists of the following stages:
//!
//! 1. Catalog - the immutable component declarations and the environment
//! 2. Condition - reduces the catalog to the enabled components
//! 3. Resolver - type, interface and name lookups over the enabled components
//! 4. Dependency Graph - hard and soft edges, cycle detection, construction levels
//! 5. Planner - produces the [`WiringPlan`] and its diagnostics
//!
//! The [`cell`] module holds the runtime primitives generated containers build on.

pub mod catalog;
pub mod cell;
pub mod condition;
pub mod dependency_graph;
pub mod diagnostics;
pub mod errors;
pub mod plan;
pub mod planner;
pub mod resolver;
pub mod types;

pub use catalog::{
    load_catalog_from_path, Catalog, ComponentDeclaration, ConditionExpr, DependencySpec,
    Environment, InjectionPoint, Scope, WrapperKind,
};
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use errors::{PlanError, PlanningError};
pub use plan::{ArgumentSource, WiringPlan, WiringStep};
pub use planner::{plan, WiringPlanner};
pub use types::ComponentId;
pub use wrapp_config::PlannerOptions;
