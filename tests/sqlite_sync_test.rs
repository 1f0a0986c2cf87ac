use article_sync::config::ListNames;
use article_sync::db::{self, Pool};
use article_sync::diff::KnownKeys;
use article_sync::model::{Article, ArticleKey, Language};
use article_sync::pipeline::{run, SyncOptions};
use article_sync::sink::{SqlFileSink, SqliteSink};
use article_sync::source::{self, SourceError, SourceFormat};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Executor;
use tempfile::tempdir;

const SOURCE: &str = r#"
export const articlesEs = [
  {
    slug: 'dolar-blue-hoy',
    title: 'Dólar blue hoy',
    excerpt: "El paralelo en Bolivia",
    content: `<p>It's "caro"</p>`,
    featured: true,
    readTime: 3,
  },
  { slug: 'reservas', title: 'Reservas', content: '<p>BCB</p>' },
];
export const articlesEn = [
  { slug: 'dolar-blue-hoy', title: 'Blue dollar today', content: '<p>EN</p>' },
];
"#;

async fn setup_pool() -> Pool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn article(slug: &str, title: &str, author: &str) -> Article {
    Article {
        slug: slug.into(),
        language: Language::Es,
        title: title.into(),
        excerpt: None,
        content: "<p>x</p>".into(),
        author: Some(author.into()),
        category: None,
        featured: false,
        read_time: None,
        published_at: None,
    }
}

#[tokio::test]
async fn script_source_lands_in_sqlite_and_second_run_skips_everything() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blog.ts");
    tokio::fs::write(&path, SOURCE).await.unwrap();

    let lists = source::read_articles(&path, None, &ListNames::default())
        .await
        .unwrap();
    assert_eq!(lists.len(), 3);

    let sink = SqliteSink::new(setup_pool().await, 50);
    let opts = SyncOptions {
        check_existing: true,
        ..Default::default()
    };
    let report = run(lists.clone().into_articles(), KnownKeys::default(), &sink, &opts)
        .await
        .unwrap();
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(db::count_articles(sink.pool()).await.unwrap(), 3);

    let stored = db::fetch_article(sink.pool(), &ArticleKey::new("dolar-blue-hoy", Language::Es))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Dólar blue hoy");
    assert_eq!(stored.content, r#"<p>It's "caro"</p>"#);
    assert_eq!(stored.excerpt.as_deref(), Some("El paralelo en Bolivia"));
    assert!(stored.featured);
    assert_eq!(stored.read_time, Some(3));

    let again = run(lists.into_articles(), KnownKeys::default(), &sink, &opts)
        .await
        .unwrap();
    assert_eq!(again.succeeded, 0);
    assert_eq!(again.skipped, 3);
    assert_eq!(db::count_articles(sink.pool()).await.unwrap(), 3);
}

#[tokio::test]
async fn forced_runs_update_rows_in_place() {
    let sink = SqliteSink::new(setup_pool().await, 50);
    let opts = SyncOptions {
        check_existing: true,
        force: true,
        ..Default::default()
    };

    run(vec![article("a", "Old", "Ana")], KnownKeys::default(), &sink, &opts)
        .await
        .unwrap();
    let report = run(vec![article("a", "New", "Bob")], KnownKeys::default(), &sink, &opts)
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);

    assert_eq!(db::count_articles(sink.pool()).await.unwrap(), 1);
    let stored = db::fetch_article(sink.pool(), &ArticleKey::new("a", Language::Es))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "New");
    assert_eq!(stored.author.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn generated_script_replays_idempotently() {
    let dir = tempdir().unwrap();
    let first_path = dir.path().join("out/first.sql");
    let second_path = dir.path().join("out/second.sql");

    let sink = SqlFileSink::create(&first_path, db::MIRROR_TABLE).await.unwrap();
    let mut quoted = article("quoted", "It's the blue dollar", "Ana");
    quoted.content = "<p>'single' and ''double''</p>".into();
    let report = run(
        vec![quoted, article("plain", "Plain", "Ana")],
        KnownKeys::default(),
        &sink,
        &SyncOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(report.succeeded, 2);

    let script = tokio::fs::read_to_string(&first_path).await.unwrap();
    assert!(script.starts_with("-- Upsert script for blog_articles"));
    assert_eq!(script.matches("INSERT INTO blog_articles").count(), 2);

    let pool = setup_pool().await;
    pool.execute(script.as_str()).await.unwrap();
    pool.execute(script.as_str()).await.unwrap();
    assert_eq!(db::count_articles(&pool).await.unwrap(), 2);

    let stored = db::fetch_article(&pool, &ArticleKey::new("quoted", Language::Es))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "It's the blue dollar");
    assert_eq!(stored.content, "<p>'single' and ''double''</p>");

    let sink = SqlFileSink::create(&second_path, db::MIRROR_TABLE).await.unwrap();
    run(
        vec![article("plain", "Plain v2", "Bob")],
        KnownKeys::default(),
        &sink,
        &SyncOptions::default(),
    )
    .await
    .unwrap();
    let script = tokio::fs::read_to_string(&second_path).await.unwrap();
    pool.execute(script.as_str()).await.unwrap();

    assert_eq!(db::count_articles(&pool).await.unwrap(), 2);
    let stored = db::fetch_article(&pool, &ArticleKey::new("plain", Language::Es))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Plain v2");
    assert_eq!(stored.author.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn generated_script_reads_back_as_a_source() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.sql");
    let sink = SqlFileSink::create(&path, "blog_articles").await.unwrap();
    let mut en = article("hello", "Hello", "Ana");
    en.language = Language::En;
    en.read_time = Some(7);
    run(
        vec![article("hola", "Hola", "Ana"), en.clone()],
        KnownKeys::default(),
        &sink,
        &SyncOptions::default(),
    )
    .await
    .unwrap();

    let lists = source::read_articles(&path, None, &ListNames::default())
        .await
        .unwrap();
    assert_eq!(lists.es.len(), 1);
    assert_eq!(lists.es[0].slug, "hola");
    assert_eq!(lists.en, vec![en]);
}

#[tokio::test]
async fn source_without_lists_writes_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("other.js");
    tokio::fs::write(&path, "export const posts = [];").await.unwrap();

    let err = source::read_articles(&path, Some(SourceFormat::Script), &ListNames::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::ListsNotFound { .. }));
}
