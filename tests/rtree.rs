use disk_rtree::{BoundingRectangle, PointN, RTree, RTreeOptions, SpatialObject};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct Point2D {
    x: f64,
    y: f64,
}

impl Point2D {
    fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }
}

impl PointN for Point2D {
    type Scalar = f64;

    fn dimensions() -> usize {
        2
    }

    fn from_value(value: f64) -> Self {
        Point2D { x: value, y: value }
    }

    fn nth(&self, index: usize) -> f64 {
        match index {
            0 => self.x,
            1 => self.y,
            _ => panic!("dimension out of range: {index}"),
        }
    }

    fn nth_mut(&mut self, index: usize) -> &mut f64 {
        match index {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => panic!("dimension out of range: {index}"),
        }
    }
}

/// A stored point object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Element {
    point: Point2D,
}

impl Element {
    fn new(x: f64, y: f64) -> Self {
        Element {
            point: Point2D::new(x, y),
        }
    }
}

impl SpatialObject for Element {
    type Point = Point2D;

    fn minimum_bounding_rectangle(&self) -> BoundingRectangle<Point2D> {
        BoundingRectangle::from_point(self.point)
    }

    fn distance_squared(&self, point: &Point2D) -> f64 {
        let dx = point.x - self.point.x;
        let dy = point.y - self.point.y;
        dx * dx + dy * dy
    }
}

/// A stored axis-aligned rectangle object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Rectangle {
    lower: Point2D,
    upper: Point2D,
}

impl Rectangle {
    fn new(lower: Point2D, upper: Point2D) -> Self {
        Rectangle { lower, upper }
    }
}

impl SpatialObject for Rectangle {
    type Point = Point2D;

    fn minimum_bounding_rectangle(&self) -> BoundingRectangle<Point2D> {
        BoundingRectangle::new(self.lower, self.upper)
    }

    fn distance_squared(&self, point: &Point2D) -> f64 {
        self.minimum_bounding_rectangle().distance_squared(point)
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn collect_matches<T: SpatialObject>(
    iter: disk_rtree::LocateInEnvelopeIntersecting<'_, T>,
) -> Vec<T> {
    iter.collect::<Result<Vec<_>, _>>().unwrap()
}

#[test]
fn test_init() {
    let dir = tempdir().unwrap();
    let tree: RTree<Element> = RTree::open(dir.path().join("init.rtree")).unwrap();

    assert_eq!(tree.size(), 0);
    assert!(tree.is_empty());
}

#[test]
fn test_insert() {
    let dir = tempdir().unwrap();
    let mut tree: RTree<Element> = RTree::open(dir.path().join("insert.rtree")).unwrap();

    tree.insert(Element::new(0.0, 0.0)).unwrap();
    tree.insert(Element::new(1.0, 1.0)).unwrap();

    assert_eq!(tree.size(), 2);
}

#[test]
fn test_insert_distinct_objects_counts_all() {
    let dir = tempdir().unwrap();
    let mut tree: RTree<Element> = RTree::open(dir.path().join("count.rtree")).unwrap();

    let n = 57;
    for i in 0..n {
        tree.insert(Element::new(i as f64 * 3.0, (i % 7) as f64)).unwrap();
    }
    assert_eq!(tree.size(), n);
}

#[test]
fn test_lots_of_inserts() {
    init_logging();
    let dir = tempdir().unwrap();
    let mut tree: RTree<Element> = RTree::open(dir.path().join("lots.rtree")).unwrap();

    for i in 0..200 {
        tree.insert(Element::new(i as f64, i as f64)).unwrap();
    }

    assert_eq!(tree.size(), 200);
    assert!(tree.height() >= 3);

    // Every stored element must come back from a containing envelope
    let everything = BoundingRectangle::new(Point2D::new(-1.0, -1.0), Point2D::new(200.0, 200.0));
    let matches = collect_matches(tree.locate_in_envelope_intersecting(everything));
    assert_eq!(matches.len(), 200);
}

#[test]
fn test_nearest_neighbor() {
    let dir = tempdir().unwrap();
    let mut tree: RTree<Element> = RTree::open(dir.path().join("nn.rtree")).unwrap();

    let zero_zero = Element::new(0.0, 0.0);
    let one_one = Element::new(1.0, 1.0);
    let three_three = Element::new(3.0, 3.0);

    tree.insert(one_one.clone()).unwrap();
    tree.insert(three_three.clone()).unwrap();

    assert_eq!(
        tree.nearest_neighbor(&zero_zero.point).unwrap(),
        Some(one_one)
    );
}

#[test]
fn test_nearest_neighbor_empty_tree() {
    let dir = tempdir().unwrap();
    let mut tree: RTree<Element> = RTree::open(dir.path().join("nn_empty.rtree")).unwrap();

    assert_eq!(tree.nearest_neighbor(&Point2D::new(4.0, 2.0)).unwrap(), None);
}

#[test]
fn test_nearest_neighbor_matches_linear_scan() {
    let dir = tempdir().unwrap();
    let mut tree: RTree<Element> = RTree::open(dir.path().join("nn_random.rtree")).unwrap();

    let mut rng = StdRng::seed_from_u64(0x5EED);
    let points: Vec<Point2D> = (0..300)
        .map(|_| Point2D::new(rng.gen_range(-500.0..500.0), rng.gen_range(-500.0..500.0)))
        .collect();
    for point in &points {
        tree.insert(Element { point: *point }).unwrap();
    }

    for _ in 0..50 {
        let sample = Point2D::new(rng.gen_range(-500.0..500.0), rng.gen_range(-500.0..500.0));
        let found = tree.nearest_neighbor(&sample).unwrap().unwrap();

        let best = points
            .iter()
            .map(|p| {
                let dx = p.x - sample.x;
                let dy = p.y - sample.y;
                dx * dx + dy * dy
            })
            .fold(f64::INFINITY, f64::min);
        assert_eq!(found.distance_squared(&sample), best);
    }
}

#[test]
fn test_locate_in_envelope_intersecting() {
    let dir = tempdir().unwrap();
    let mut tree: RTree<Rectangle> = RTree::open(dir.path().join("locate.rtree")).unwrap();

    let left_piece = Rectangle::new(Point2D::new(0.0, 0.0), Point2D::new(0.4, 1.0));
    let right_piece = Rectangle::new(Point2D::new(0.6, 0.0), Point2D::new(1.0, 1.0));
    let middle_piece = Rectangle::new(Point2D::new(0.25, 0.0), Point2D::new(0.75, 1.0));

    tree.insert(left_piece.clone()).unwrap();
    tree.insert(right_piece.clone()).unwrap();
    tree.insert(middle_piece.clone()).unwrap();

    // The left piece does not intersect the right piece
    let intersecting_left =
        collect_matches(tree.locate_in_envelope_intersecting(left_piece.minimum_bounding_rectangle()));
    assert_eq!(intersecting_left.len(), 2);
    assert!(intersecting_left.contains(&left_piece));
    assert!(intersecting_left.contains(&middle_piece));
    assert!(!intersecting_left.contains(&right_piece));

    // Only the middle piece intersects all pieces within the tree
    let intersecting_middle = collect_matches(
        tree.locate_in_envelope_intersecting(middle_piece.minimum_bounding_rectangle()),
    );
    assert_eq!(intersecting_middle.len(), 3);

    // Fully contained elements are also returned
    let large_piece =
        BoundingRectangle::new(Point2D::new(-100.0, -100.0), Point2D::new(100.0, 100.0));
    let intersecting_large = collect_matches(tree.locate_in_envelope_intersecting(large_piece));
    assert_eq!(intersecting_large.len(), 3);
}

#[test]
fn test_touching_rectangles_count_as_intersecting() {
    let dir = tempdir().unwrap();
    let mut tree: RTree<Rectangle> = RTree::open(dir.path().join("touch.rtree")).unwrap();

    // Share exactly the edge x = 1.0
    let west = Rectangle::new(Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0));
    let east = Rectangle::new(Point2D::new(1.0, 0.0), Point2D::new(2.0, 1.0));

    tree.insert(west.clone()).unwrap();
    tree.insert(east.clone()).unwrap();

    let through_west =
        collect_matches(tree.locate_in_envelope_intersecting(west.minimum_bounding_rectangle()));
    assert_eq!(through_west.len(), 2);

    let through_east =
        collect_matches(tree.locate_in_envelope_intersecting(east.minimum_bounding_rectangle()));
    assert_eq!(through_east.len(), 2);
}

#[test]
fn test_queries_are_idempotent() {
    let dir = tempdir().unwrap();
    let mut tree: RTree<Element> = RTree::open(dir.path().join("idempotent.rtree")).unwrap();

    for i in 0..40 {
        tree.insert(Element::new((i % 8) as f64, (i / 8) as f64 + i as f64 * 0.01))
            .unwrap();
    }

    let envelope = BoundingRectangle::new(Point2D::new(1.5, -1.0), Point2D::new(6.5, 10.0));
    let sort_key = |e: &Element| (e.point.x.to_bits(), e.point.y.to_bits());

    let mut first = collect_matches(tree.locate_in_envelope_intersecting(envelope.clone()));
    let mut second = collect_matches(tree.locate_in_envelope_intersecting(envelope));
    first.sort_by_key(sort_key);
    second.sort_by_key(sort_key);

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_round_trip_via_persistence() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("roundtrip.rtree");

    let everything = BoundingRectangle::new(Point2D::new(-1.0, -1.0), Point2D::new(300.0, 300.0));
    {
        let mut tree: RTree<Element> = RTree::open(&path).unwrap();
        for i in 0..120 {
            tree.insert(Element::new(i as f64, (i * 2) as f64 % 31.0)).unwrap();
        }
        assert_eq!(tree.size(), 120);
        // Dropping the tree flushes pending writes
    }

    let mut tree: RTree<Element> = RTree::open(&path).unwrap();
    assert_eq!(tree.size(), 120);

    let matches = collect_matches(tree.locate_in_envelope_intersecting(everything.clone()));
    assert_eq!(matches.len(), 120);

    let nearest = tree.nearest_neighbor(&Point2D::new(0.0, 0.0)).unwrap();
    assert_eq!(nearest, Some(Element::new(0.0, 0.0)));

    // The reopened tree accepts further mutation
    tree.insert(Element::new(250.0, 250.0)).unwrap();
    assert_eq!(tree.size(), 121);
    let matches = collect_matches(tree.locate_in_envelope_intersecting(everything));
    assert_eq!(matches.len(), 121);
}

#[test]
fn test_explicit_flush_persists_without_drop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flush.rtree");

    let mut tree: RTree<Element> = RTree::open(&path).unwrap();
    tree.insert(Element::new(5.0, 5.0)).unwrap();
    tree.flush().unwrap();

    // A second handle opened from the flushed file sees the insert
    let reopened: RTree<Element> = RTree::open(&path).unwrap();
    assert_eq!(reopened.size(), 1);
    drop(reopened);
    drop(tree);
}

#[test]
fn test_custom_fanout_options() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fanout.rtree");

    let options = RTreeOptions::new()
        .set_max_node_size(10)
        .set_min_node_size(5);
    let mut tree: RTree<Element> = RTree::open_with_options(&path, options).unwrap();

    for i in 0..11 {
        tree.insert(Element::new(i as f64, 0.0)).unwrap();
    }
    // 11 children overflow a 10-way node exactly once
    assert_eq!(tree.height(), 2);
    assert_eq!(tree.size(), 11);
}

#[test]
fn test_storage_error_aborts_insert_without_partial_commit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.rtree");

    {
        let mut tree: RTree<Element> = RTree::open(&path).unwrap();
        for i in 0..20 {
            tree.insert(Element::new(i as f64, i as f64)).unwrap();
        }
        assert_eq!(tree.height(), 2);
    }

    // Corrupt every page except the header and the root, so any descent
    // below the root hits unreadable data. Header layout: magic u32,
    // version u32, page_size u32, root_page u64, next_page_id u64,
    // little-endian fixed-width.
    let mut bytes = std::fs::read(&path).unwrap();
    let root_page = u64::from_le_bytes(bytes[12..20].try_into().unwrap());
    let next_page_id = u64::from_le_bytes(bytes[20..28].try_into().unwrap());
    let page_size = 4096;
    for page in 1..next_page_id {
        if page == root_page {
            continue;
        }
        let offset = page as usize * page_size + 40;
        bytes[offset] ^= 0xFF;
    }
    std::fs::write(&path, bytes).unwrap();

    let mut tree: RTree<Element> = RTree::open(&path).unwrap();
    assert_eq!(tree.size(), 20);

    // The descent load fails before the tree is touched
    assert!(tree.insert(Element::new(5.5, 5.5)).is_err());
    assert_eq!(tree.size(), 20);

    // A failure below the root surfaces as an Err item mid-iteration
    let everything = BoundingRectangle::new(Point2D::new(-1.0, -1.0), Point2D::new(30.0, 30.0));
    let results: Vec<_> = tree.locate_in_envelope_intersecting(everything).collect();
    assert!(results.iter().any(|r| r.is_err()));
}

#[test]
fn test_rectangles_survive_splits_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rect_bulk.rtree");

    let mut rng = StdRng::seed_from_u64(42);
    let mut rectangles = Vec::new();
    for _ in 0..80 {
        let x = rng.gen_range(-200.0..200.0);
        let y = rng.gen_range(-200.0..200.0);
        let w = rng.gen_range(0.0..20.0);
        let h = rng.gen_range(0.0..20.0);
        rectangles.push(Rectangle::new(
            Point2D::new(x, y),
            Point2D::new(x + w, y + h),
        ));
    }

    {
        let mut tree: RTree<Rectangle> = RTree::open(&path).unwrap();
        for rectangle in &rectangles {
            tree.insert(rectangle.clone()).unwrap();
        }
    }

    let mut tree: RTree<Rectangle> = RTree::open(&path).unwrap();
    let probe = BoundingRectangle::new(Point2D::new(-50.0, -50.0), Point2D::new(50.0, 50.0));
    let expected: Vec<&Rectangle> = rectangles
        .iter()
        .filter(|r| r.minimum_bounding_rectangle().intersects(&probe))
        .collect();

    let found = collect_matches(tree.locate_in_envelope_intersecting(probe));
    assert_eq!(found.len(), expected.len());
    for rectangle in expected {
        assert!(found.contains(rectangle));
    }
}
