pub mod assembler;   // verdicts + metadata -> 14-column records
pub mod exclusions;  // human-curated allow-list, injected from a file
pub mod recorder;    // async CSV output (full + filtered views)
pub mod metadata;    // identity -> vote account / name resolution
pub mod sink;        // append-only audit log of detected instances
