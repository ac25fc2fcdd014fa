pub mod customer;
pub mod mementos;

// ── Tests ──
