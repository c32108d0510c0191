use flatfs::driver::{FileDrive, MemoryDrive};
use flatfs::{BlockDevice, Disk, FileSystem, FsError, Geometry};

fn new_fs() -> FileSystem<Disk<MemoryDrive>> {
    FileSystem::format(Disk::memory(Geometry::default()).unwrap()).unwrap()
}

#[test]
fn create_write_close_open_read_delete() {
    let mut fs = new_fs();
    let fd = fs.create("a.txt").unwrap();
    assert_eq!(fd, 0);
    fs.write(0, b"hello").unwrap();
    fs.close(0).unwrap();

    let fd = fs.open("a.txt").unwrap();
    assert_eq!(fd, 0);
    assert_eq!(fs.read(0).unwrap(), b"hello");

    fs.delete("a.txt").unwrap();
    assert!(matches!(fs.open("a.txt"), Err(FsError::NotFound(_))));
    fs.check().unwrap();
}

#[test]
fn deleted_slot_is_reused() {
    let mut fs = new_fs();
    let first = fs.create("first").unwrap();
    let second = fs.create("second").unwrap();
    assert_eq!((first, second), (0, 1));

    fs.delete("first").unwrap();
    assert_eq!(fs.create("third").unwrap(), first);
}

#[test]
fn deleting_unknown_name_twice_changes_nothing() {
    let mut fs = new_fs();
    let fd = fs.create("kept").unwrap();
    fs.write(fd, b"data").unwrap();
    let files = fs.list().unwrap();
    let free = fs.free_blocks();

    fs.delete("ghost").unwrap();
    fs.delete("ghost").unwrap();

    assert_eq!(fs.list().unwrap(), files);
    assert_eq!(fs.free_blocks(), free);
    assert_eq!(fs.open_descriptor(), Some(fd));
}

#[test]
fn open_supersedes_previous_session() {
    let mut fs = new_fs();
    let a = fs.create("a").unwrap();
    fs.write(a, b"first file").unwrap();
    let b = fs.create("b").unwrap();

    assert!(matches!(fs.read(a), Err(FsError::InvalidDescriptor(_))));
    assert!(matches!(fs.close(a), Err(FsError::DescriptorMismatch { .. })));

    let a = fs.open("a").unwrap();
    assert_eq!(fs.read(a).unwrap(), b"first file");
    assert_ne!(a, b);
}

#[test]
fn files_keep_their_own_content() {
    let mut fs = new_fs();
    let contents: Vec<(String, Vec<u8>)> = (0..10)
        .map(|i| (format!("file{}", i), vec![i as u8; 300 * i + 1]))
        .collect();

    for (name, data) in contents.iter() {
        let fd = fs.create(name).unwrap();
        fs.write(fd, data).unwrap();
        fs.close(fd).unwrap();
    }
    fs.delete("file3").unwrap();
    fs.delete("file7").unwrap();

    for (name, data) in contents.iter() {
        match fs.open(name) {
            Ok(fd) => assert_eq!(&fs.read(fd).unwrap(), data),
            Err(FsError::NotFound(_)) => assert!(name == "file3" || name == "file7"),
            Err(e) => panic!("unexpected error {}", e),
        }
    }
    fs.check().unwrap();
}

#[test]
fn volume_fills_up() {
    let mut fs = FileSystem::format(Disk::memory(Geometry::new(8, 32, 512)).unwrap()).unwrap();
    let max = fs.max_file_size();
    let a = fs.create("a").unwrap();
    fs.write(a, &vec![1; max]).unwrap();
    let b = fs.create("b").unwrap();
    fs.write(b, &vec![2; max]).unwrap();
    assert_eq!(fs.free_blocks(), 0);

    let c = fs.create("c").unwrap();
    assert!(matches!(fs.write(c, b"x"), Err(FsError::InsufficientSpace { .. })));
    fs.delete("a").unwrap();
    let c = fs.open("c").unwrap();
    fs.write(c, b"x").unwrap();
    fs.check().unwrap();
}

#[test]
fn image_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("volume.img");
    let geometry = Geometry::new(16, 64, 1024);

    {
        let drive = FileDrive::new(&path, geometry.device_bytes(), 512).unwrap();
        let mut fs = FileSystem::format(Disk::new(drive, geometry).unwrap()).unwrap();
        let fd = fs.create("notes").unwrap();
        fs.write(fd, &b"line\n".repeat(400)).unwrap();
        fs.close(fd).unwrap();
    }

    let disk = Disk::open(FileDrive::open(&path, 512).unwrap()).unwrap();
    assert_eq!(disk.geometry(), geometry);
    let mut fs = FileSystem::mount(disk).unwrap();
    let fd = fs.open("notes").unwrap();
    assert_eq!(fs.read(fd).unwrap(), b"line\n".repeat(400));
    assert_eq!(fs.free_blocks(), 62);
    fs.check().unwrap();
}
