use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shroudfs::{EncryptedFile, FileParams, MemBackend};
use std::sync::Arc;

fn bench_file_io(c: &mut Criterion) {
    let cipher = shroudfs::new_cipher_by_name("aes", Some(256)).unwrap();
    let key = Arc::new(cipher.new_random_key().unwrap());
    let params = FileParams { block_size: 1024, mac_bytes: 8, rand_bytes: 0, unique_iv: true };
    let data = vec![0x5Au8; 1024 * 1024];

    c.bench_function("write_1mb", |b| {
        b.iter(|| {
            let file = EncryptedFile::open(
                Box::new(MemBackend::new()),
                cipher.clone(),
                key.clone(),
                params,
                0,
            )
            .unwrap();
            file.write(0, black_box(&data)).unwrap();
        })
    });

    let file = EncryptedFile::open(Box::new(MemBackend::new()), cipher.clone(), key, params, 0).unwrap();
    file.write(0, &data).unwrap();
    let mut buf = vec![0u8; 1024 * 1024];
    c.bench_function("read_1mb", |b| {
        b.iter(|| file.read(0, black_box(&mut buf)).unwrap())
    });
}

criterion_group!(benches, bench_file_io);
criterion_main!(benches);
