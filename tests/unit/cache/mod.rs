pub mod serializer_cache_test;
