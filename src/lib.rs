pub mod core;
pub mod index;
pub mod memory;
pub mod storage;
pub mod cache;
pub mod query;
pub mod search;
pub mod writer;

pub use crate::core::config::Config;
pub use crate::core::database::Database;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::Id;
pub use crate::index::set::{IdSet, Membership};
pub use crate::search::results::QueryResult;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                               RANKDEX STRUCT ARCHITECTURE                                   │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                               struct Database                                       │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: Config                     // Pool sizes, thresholds, cache limits   │ │    │
│  │  │ storage: Arc<dyn Storage>          // Durable sets/lists/resources           │ │    │
│  │  │ ids: IdMap                         // External string id <-> Id              │ │    │
│  │  │ interner: Arc<Interner>            // Resource type name -> Tag              │ │    │
│  │  │ sets: RwLock<HashMap<_, Arc<IdSet>>>   // Swapped whole, never mutated       │ │    │
│  │  │ lists: RwLock<HashMap<_, Arc<IdSet>>>                                        │ │    │
│  │  │ cache: Cache                       // Sharded TTL payload cache              │ │    │
│  │  │ queries: Pool<QueryState>          // Blocking checkout = admission control  │ │    │
│  │  │ query_count: AtomicU64                                                       │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│  │ struct Config    │  │ struct Id(u32)   │  │ struct DatabaseStats                  │    │
│  │ • max_results    │  │ • NONE = Id(0)   │  │ • set_count / list_count              │    │
│  │ • max_sets       │  └──────────────────┘  │ • queries_executed                    │    │
│  │ • cache_size     │  ┌──────────────────┐  │ • cache: CacheStats                   │    │
│  │ • batch_sizes    │  │ enum Projection  │  └───────────────────────────────────────┘    │
│  └──────────────────┘  │ • Summary        │                                                │
│                        │ • Detailed       │                                                │
│                        └──────────────────┘                                                │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── INDEX LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌───────────────────────────────┐   ┌──────────────────────────────────────────────────┐ │
│  │ trait Membership              │   │ enum IdSet  (variant chosen once, by size)       │ │
│  │ • len / exists                │   │ • Sorted(SortedSet)     < 32, binary search      │ │
│  │ • each(desc, f)               │◄──│ • Bitmap(BitmapSet)     roaring, O(1) exists     │ │
│  │ • can_rank / rank             │   │ • ShortList(ShortList)  < 32, linear rank        │ │
│  │ • around(id, f)               │   │ • List(RankedList)      Id -> rank map           │ │
│  └───────────────────────────────┘   └──────────────────────────────────────────────────┘ │
│                                                                                              │
│  ┌───────────────────────────────┐                                                         │
│  │ struct Sets                   │   Query-scoped, bounded, sorted by cardinality         │
│  │ • sets: Vec<Arc<IdSet>>       │                                                         │
│  │ • max: usize                  │                                                         │
│  └───────────────────────────────┘                                                         │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── QUERY LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  db.query() ─► Query<'db> { state: Pooled<QueryState>, db }                                 │
│                 .sort("recent").and("tagged").offset(n).limit(n).desc().around(id)          │
│                 .execute()                                                                   │
│                    │                                                                         │
│                    ├─ limit == 0 / no sort source / empty source ─► QueryResult::empty()    │
│                    ├─ smallest filter < 500 && source > 1000 && rankable && !around          │
│                    │      ─► executor::set_driven (walk filter, sort by rank)               │
│                    └─ otherwise ─► executor::scan (walk source, Filter::matches)            │
│                    │                                                                         │
│                    └─► Cache::fill(result, detailed) ─► QueryResult (releases on drop)      │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── CACHE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌──────────────────────────────────────┐   ┌──────────────────────────────────────────┐  │
│  │ struct Cache                         │   │ struct Bucket                             │  │
│  │ • summary: Vec<Bucket>               │   │ • lookup: RwLock<HashMap<Id, Arc<Item>>>  │  │
│  │ • details: Vec<Bucket>               │──►│                                           │  │
│  │ • tracker: SizeTracker (AtomicI64)   │   │ enum Value                                │  │
│  │ • gcing: AtomicBool (single flight)  │   │ • Payload { tag, data: Bytes }            │  │
│  │ • fetcher: Arc<dyn Fetcher>          │   │ • SummaryOnly                             │  │
│  └──────────────────────────────────────┘   └──────────────────────────────────────────┘  │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── STORAGE LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  trait Fetcher ◄── trait Storage ◄──┬── MemoryStorage  (maps + change tracking)             │
│                                      └── SqliteStorage  (rusqlite, prepared IN-batches)     │
│                                                                                              │
│  Batcher: [25, 20, 15, 10, 5, 4, 3, 2, 1]   largest size <= remaining, repeat               │
│  codec:   ids = [u32 LE]*   dictionary = ([u8 len][utf8][u32 LE])*                          │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
