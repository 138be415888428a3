//! Rules shipped with the crate.
//!
//! | Module | Reads | Writes |
//! |--------|-------|--------|
//! | `double_age` | first source | first target, source × 2 |
//! | `copy_variable` | sources | targets, copied pairwise |
//! | `pd_by_drug` | drug code (`RXDDRGID`) | one flag row per participant on levodopa |

pub mod copy_variable;
pub mod double_age;
pub mod pd_by_drug;
