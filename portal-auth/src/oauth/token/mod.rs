//! OAuth token types and the token endpoint client.

mod exchanger;
mod tokens;

pub use exchanger::TokenExchanger;
pub use tokens::TokenSet;
