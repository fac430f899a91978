//! Local processing stages. None of these touch the network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ (remote) ──▶ ranges ──▶ extract ──▶ compose
//! (classify) (lopdf)              (order)    (geometry)   (markdown)
//! ```
//!
//! 1. [`input`]    - validate the source and pick Sync vs Batch
//! 2. [`split`]    - optional spread splitting; runs in `spawn_blocking`
//!    because lopdf is synchronous
//! 3. [`encode`]   - base64 for the synchronous single-image call
//! 4. [`ranges`]   - order downloaded result files by start page
//! 5. [`extract`]  - rebuild page text from the symbol tree, using
//!    [`geometry`] for ruby detection
//! 6. [`compose`]  - pure page texts → Markdown

pub mod compose;
pub mod encode;
pub mod extract;
pub mod geometry;
pub mod input;
pub mod ranges;
pub mod split;
