// Plugin crates register their factories through `inventory`; nothing else references
// them, so they are named here to keep them linked into the binary.
#![allow(unused_imports)]

use memory_metrics_plugin as _;
use memory_storage_plugin as _;
use org_quota_plugin as _;
use static_auth_plugin as _;
use static_federation_plugin as _;
