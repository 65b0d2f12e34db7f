//! Abstract-namespace endpoint naming (spec §4.3/§4.4). Grounded on
//! `isProcessManagement.c`'s `snprintf(dealer_endpoint, ..., "ipc://@%s",
//! rtn->key)`: the leading `@` puts the socket in the Linux abstract
//! namespace, so no filesystem path is ever created or needs cleanup.

/// Endpoint a root process binds/connects to reach one child supervisor's
/// parent-facing dealer, named by the process registry key.
pub fn ipc_endpoint(key: &str) -> String {
    format!("ipc://@{key}")
}

/// Endpoint a supervisor's worker threads connect to reach its in-process
/// dealer (spec §4.4: "a dealer socket (bound to an inproc endpoint) that
/// workers connect to").
pub fn inproc_endpoint(key: &str) -> String {
    format!("inproc://#{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipc_endpoint_uses_abstract_namespace_prefix() {
        assert_eq!(ipc_endpoint("S1-0"), "ipc://@S1-0");
    }

    #[test]
    fn inproc_endpoint_is_process_local() {
        assert_eq!(inproc_endpoint("S1-0"), "inproc://#S1-0");
    }
}
