// Domain model and algorithms for Kernelize.

pub mod ast;
pub mod critical_section;
pub mod diagnostic;
pub mod idiom;
pub mod matchers;
pub mod rewrite;
pub mod safety;
pub mod span;
pub mod walk;
