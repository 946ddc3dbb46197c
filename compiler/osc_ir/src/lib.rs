//! osc IR - identifiers and scope shapes for the osc runtime.
//!
//! This crate holds the call-independent data the front end computes once
//! and every execution reuses:
//! - `Symbol`: interned member names (`SymbolInterner`, [`symbols()`])
//! - `Permission`: access tier and modifier bits of a member slot
//! - `MemberIndexTable` / `ScopeShape`: `Symbol -> slot` mappings shared by
//!   every instance of a scope, in three permission-filtered views
//!
//! Nothing here knows about runtime values; see `osc_eval` for those.

mod interner;
mod member_index;
mod permission;
mod symbol;

pub use interner::{symbols, InternError, SymbolInterner};
pub use member_index::{MemberIndexTable, MemberIndexTableBuilder, ScopeShape};
pub use permission::{Permission, PermissionTier};
pub use symbol::Symbol;
