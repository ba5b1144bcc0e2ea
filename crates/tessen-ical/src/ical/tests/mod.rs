//! Cross-module tests exercising the registry, the codecs, and the
//! document context together.
