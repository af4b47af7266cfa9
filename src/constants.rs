/// Manifest media types understood by the index
pub mod media_type {
    /// OCI image index
    pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

    /// OCI image manifest
    pub const OCI_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image config
    pub const OCI_IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";

    /// Docker manifest list (v2)
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// Docker image manifest, schema 2
    pub const DOCKER_MANIFEST_SCHEMA2: &str =
        "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker image manifest, schema 1
    pub const DOCKER_MANIFEST_SCHEMA1: &str =
        "application/vnd.docker.distribution.manifest.v1+json";

    /// Docker image manifest, schema 1 with JWS signature
    pub const DOCKER_MANIFEST_SCHEMA1_SIGNED: &str =
        "application/vnd.docker.distribution.manifest.v1+prettyjws";

    /// Docker image config
    pub const DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";

    /// Every manifest media type a registry may hand back for an index lookup
    pub const ACCEPTED_MANIFESTS: &[&str] = &[
        OCI_IMAGE_INDEX,
        OCI_IMAGE_MANIFEST,
        DOCKER_MANIFEST_LIST,
        DOCKER_MANIFEST_SCHEMA2,
        DOCKER_MANIFEST_SCHEMA1,
        DOCKER_MANIFEST_SCHEMA1_SIGNED,
    ];
}

/// OCI layout file names
pub mod layout {
    /// Marker file identifying an OCI image layout
    pub const OCI_LAYOUT_FILE: &str = "oci-layout";

    /// Contents of the marker file
    pub const OCI_LAYOUT_VERSION: &str = r#"{"imageLayoutVersion":"1.0.0"}"#;

    /// Top-level index of an OCI image layout
    pub const INDEX_FILE: &str = "index.json";

    /// Directory holding content-addressed blobs
    pub const BLOBS_DIR: &str = "blobs";
}

/// Defaults for index handling
pub mod defaults {
    /// Default tag when a reference carries neither tag nor digest
    pub const TAG: &str = "latest";

    /// Upper bound on concurrent registry fetches while walking an index tree
    pub const MAX_CONCURRENT_FETCHES: usize = 4;

    /// Directory under the runtime dir where index layouts are kept
    pub const MANIFESTS_DIR: &str = "manifests";
}
