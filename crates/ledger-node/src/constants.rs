pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
/// Path on a peer that serves its chain.
pub(crate) const CHAIN_PATH: &str = "/chain";
