//! Fuzz target for import path routing.

#![no_main]

use gopkg_node::ImportRouter;
use gopkg_types::Hosts;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(path) = std::str::from_utf8(data) else {
        return;
    };

    let router = ImportRouter::new(Arc::new(Hosts {
        gateway_scheme: "https".to_string(),
        gateway_host: "gopkg.example.com".to_string(),
        upstream_url: "https://git.example.com".to_string(),
    }));

    if let Ok(repo) = router.route(path) {
        assert!(repo.major_version.is_valid());
        assert_eq!(repo.major_version.minor(), None);
        assert!(path.ends_with(&repo.sub_path));
    }
});
