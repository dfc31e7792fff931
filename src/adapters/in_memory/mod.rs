//! インメモリ実装
//!
//! テストとローカル実行用。全てのポートを1つのストアで実装する。

mod store;

pub use store::{FaultPoint, InMemoryStore, InjectedFault, MissingRow};
