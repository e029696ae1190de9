use criterion::{black_box, criterion_group, criterion_main, Criterion};

use async_trait::async_trait;
use waitdb::backend::{self, Connector};
use waitdb::connection_string::{self, ConnectionSpec, Credentials};
use waitdb::jdbc;
use waitdb::policy::ProbeConfig;
use waitdb::prober::{ConnectorProber, Prober};

const URLS: [&str; 3] = [
    "jdbc:oracle:thin:@hostname:1521:sid",
    "jdbc:oracle:thin:@//hostname:1521/ORCLPDB1",
    "jdbc:sqlserver://icm-mssql-server:1433;databaseName=icmdb;encrypt=false",
];

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("parse jdbc urls", |b| {
        b.iter(|| {
            for url in URLS {
                black_box(jdbc::parse(black_box(url)).unwrap());
            }
        })
    });

    let credentials = Credentials::new("scott", "tiger");
    let targets: Vec<_> = URLS.iter().map(|url| jdbc::parse(url).unwrap()).collect();
    c.bench_function("render connection strings", |b| {
        b.iter(|| {
            for target in &targets {
                black_box(connection_string::build(black_box(target), &credentials).unwrap());
            }
        })
    });

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let spec = connection_string::build(&targets[2], &credentials).unwrap();
    let prober = ConnectorProber::new(InstantConnector {}, ProbeConfig::default());
    c.bench_function("probe through connector", |b| {
        b.to_async(&rt).iter(|| probe(&prober, black_box(&spec)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

async fn probe(prober: &ConnectorProber<InstantConnector>, spec: &ConnectionSpec) {
    prober.probe(spec).await;
}

struct InstantConnector {}

#[async_trait]
impl Connector for InstantConnector {
    type Connection = ();

    async fn connect(&self, _spec: &ConnectionSpec) -> Result<Self::Connection, backend::Error> {
        Ok(())
    }

    async fn count_rows(&self, _: &mut Self::Connection, _: &str) -> Result<usize, backend::Error> {
        Ok(12)
    }
}
