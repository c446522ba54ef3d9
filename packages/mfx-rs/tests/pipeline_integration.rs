use mfx_rs::volume::{write_volume, write_volume_i16, VoxelType};
use mfx_rs::{
    cluster_table, generate_report, make_group_mask, read_volume3, watershed_segment, GroupConfig,
    PeakState, ReportInputs, StandardSpaceLocator, VolumeGeometry,
};
use ndarray::{Array3, Array4};
use nalgebra::Matrix4;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GRID: (usize, usize, usize) = (26, 26, 26);
const TABLE_HEADER: &str = "Cluster Index\tValue\tx\ty\tz\t\n";

#[rustfmt::skip]
fn geometry() -> VolumeGeometry {
    VolumeGeometry {
        affine: Matrix4::new(
            -2.0, 0.0, 0.0, 26.0,
            0.0, 2.0, 0.0, -26.0,
            0.0, 0.0, 2.0, -26.0,
            0.0, 0.0, 0.0, 1.0,
        ),
        pixdim: [2.0, 2.0, 2.0],
        sform_code: 4,
    }
}

fn template() -> Array3<f64> {
    Array3::from_shape_fn(GRID, |(x, y, z)| {
        let inside = |v: usize| (1..25).contains(&v);
        if inside(x) && inside(y) && inside(z) {
            1.0
        } else {
            0.0
        }
    })
}

/// Two cones with disjoint supports peaking at (5,5,5) and (20,20,20)
fn two_blobs() -> Array3<f64> {
    Array3::from_shape_fn(GRID, |(x, y, z)| {
        let d = |c: f64| {
            ((x as f64 - c).powi(2) + (y as f64 - c).powi(2) + (z as f64 - c).powi(2)).sqrt()
        };
        (8.1 - d(5.0)).max(0.0).max((5.3 - d(20.0)).max(0.0))
    })
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn out_dir(&self, name: &str) -> PathBuf {
        let dir = self.path(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn volume3(&self, name: &str, data: &Array3<f64>) -> PathBuf {
        let path = self.path(name);
        write_volume(&path, data, &geometry(), VoxelType::Float32).unwrap();
        path
    }

    fn volume4(&self, name: &str, data: &Array4<f64>) -> PathBuf {
        let path = self.path(name);
        write_volume(&path, data, &geometry(), VoxelType::Float32).unwrap();
        path
    }

    fn text(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn template(&self) -> PathBuf {
        let path = self.path("template_mask.nii.gz");
        write_volume_i16(&path, &template(), &geometry()).unwrap();
        path
    }
}

fn varcopes(subjects: usize) -> Array4<f64> {
    Array4::from_shape_fn((GRID.0, GRID.1, GRID.2, subjects), |(x, _, _, s)| {
        0.5 + (x + s) as f64 * 0.01
    })
}

#[test]
fn test_mask_equals_template_when_variance_is_positive() {
    let fx = Fixture::new();
    let template = fx.template();
    let var = fx.volume4("varcope1_merged.nii.gz", &varcopes(3));

    let mask_file = make_group_mask(&var, &template, &fx.out_dir("out")).unwrap();
    assert_eq!(mask_file.file_name().unwrap(), "group_mask.nii.gz");
    let mask = read_volume3(&mask_file).unwrap();
    assert_eq!(mask.data, self::template());
    assert_eq!(mask.geometry.affine, geometry().affine);
}

#[test]
fn test_mask_is_idempotent() {
    let fx = Fixture::new();
    let template = fx.template();
    let var = fx.volume4("varcope1_merged.nii.gz", &varcopes(3));

    let first = make_group_mask(&var, &template, &fx.out_dir("first")).unwrap();
    let first_bytes = std::fs::read(&first).unwrap();
    let second = make_group_mask(&var, &template, &fx.out_dir("second")).unwrap();
    assert_eq!(first_bytes, std::fs::read(&second).unwrap());

    let again = make_group_mask(&var, &template, &fx.out_dir("first")).unwrap();
    assert_eq!(again, first);
    assert_eq!(first_bytes, std::fs::read(&again).unwrap());
}

#[test]
fn test_mask_drops_voxel_with_zero_variance_in_one_subject() {
    let fx = Fixture::new();
    let template = fx.template();
    let mut stack = varcopes(3);
    stack[[10, 10, 10, 1]] = 0.0;
    let var = fx.volume4("varcope1_merged.nii.gz", &stack);

    let mask_file = make_group_mask(&var, &template, &fx.out_dir("out")).unwrap();
    let mask = read_volume3(&mask_file).unwrap();
    assert_eq!(mask.data[[10, 10, 10]], 0.0);
    assert_eq!(mask.data[[10, 10, 11]], 1.0);
    assert_eq!(mask.data.sum(), self::template().sum() - 1.0);
}

#[test]
fn test_mask_rejects_mismatched_template() {
    let fx = Fixture::new();
    let template = fx.template();
    let var = fx.volume4(
        "varcope1_merged.nii.gz",
        &Array4::from_elem((26, 26, 25, 2), 1.0),
    );
    let err = make_group_mask(&var, &template, &fx.out_dir("out")).unwrap_err();
    assert!(err.to_string().contains("variance stack"));
}

#[test]
fn test_segmentation_labels_follow_table_rows() {
    let fx = Fixture::new();
    let zstat = fx.volume3("zstat1_thresh.nii.gz", &two_blobs());
    let table = fx.text(
        "localmax.txt",
        &format!("{}2\t8.1\t5\t5\t5\t\n1\t5.3\t20\t20\t20\t\n", TABLE_HEADER),
    );

    let out = watershed_segment(&zstat, &table, &fx.out_dir("out")).unwrap();
    assert_eq!(out.state, PeakState::HasPeaks(2));
    assert_eq!(out.seg_file.file_name().unwrap(), "zstat1_thresh_seg.nii.gz");
    assert_eq!(out.peak_file.file_name().unwrap(), "zstat1_thresh_peaks.nii.gz");
    assert_eq!(out.lut_file.file_name().unwrap(), "zstat1_thresh_seg.txt");

    let seg = read_volume3(&out.seg_file).unwrap();
    assert_eq!(seg.data[[5, 5, 5]], 1.0);
    assert_eq!(seg.data[[20, 20, 20]], 2.0);
    assert_eq!(seg.data.fold(0.0f64, |m, &v| m.max(v)), 2.0);

    let peaks = read_volume3(&out.peak_file).unwrap();
    assert_eq!(peaks.data.iter().filter(|&&v| v != 0.0).count(), 2);

    let lut = std::fs::read_to_string(&out.lut_file).unwrap();
    let lines: Vec<&str> = lut.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "#ID\tROI\tR\tG\tB\tA");
    assert_eq!(lines[1], "0\tUnknown\t0\t0\t0\t0");
    assert!(lines[2].starts_with("1\troi_1\t"));
    assert!(lines[3].starts_with("2\troi_2\t"));
}

#[test]
fn test_segmentation_is_idempotent() {
    let fx = Fixture::new();
    let zstat = fx.volume3("zstat1_thresh.nii.gz", &two_blobs());
    let table = fx.text(
        "localmax.txt",
        &format!("{}2\t8.1\t5\t5\t5\t\n1\t5.3\t20\t20\t20\t\n", TABLE_HEADER),
    );

    let first = watershed_segment(&zstat, &table, &fx.out_dir("a")).unwrap();
    let second = watershed_segment(&zstat, &table, &fx.out_dir("b")).unwrap();
    for (a, b) in [
        (&first.seg_file, &second.seg_file),
        (&first.peak_file, &second.peak_file),
        (&first.lut_file, &second.lut_file),
    ] {
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}

#[test]
fn test_empty_table_gives_empty_segmentation() {
    let fx = Fixture::new();
    let zstat = fx.volume3("zstat1_thresh.nii.gz", &two_blobs());
    let table = fx.text("localmax.txt", TABLE_HEADER);

    let out = watershed_segment(&zstat, &table, &fx.out_dir("out")).unwrap();
    assert_eq!(out.state, PeakState::NoPeaks);
    let seg = read_volume3(&out.seg_file).unwrap();
    assert!(seg.data.iter().all(|&v| v == 0.0));
    let lut = std::fs::read_to_string(&out.lut_file).unwrap();
    assert_eq!(lut.lines().count(), 2);
}

#[test]
fn test_cluster_table_uses_world_coordinates() {
    let fx = Fixture::new();
    let template = fx.template();
    let table = fx.text(
        "zstat1_localmax.txt",
        &format!("{}2\t8.1\t5\t5\t5\t\n1\t5.3\t20\t20\t20\t\n", TABLE_HEADER),
    );
    let locator = StandardSpaceLocator::load(&template, None).unwrap();

    let csv = cluster_table(&table, &fx.out_dir("out"), &locator).unwrap();
    assert_eq!(csv.file_name().unwrap(), "zstat1_localmax.csv");
    let text = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Peak,Cluster,Value,x,y,z,MaxProb Region,Prob");
    assert_eq!(lines[1], "0,2,8.1,16,-16,-16,Unknown,0");
    assert_eq!(lines[2], "1,1,5.3,-14,14,14,Unknown,0");
}

#[test]
fn test_cluster_table_empty_keeps_voxel_schema() {
    let fx = Fixture::new();
    let template = fx.template();
    let table = fx.text("zstat1_localmax.txt", TABLE_HEADER);
    let locator = StandardSpaceLocator::load(&template, None).unwrap();

    let csv = cluster_table(&table, &fx.out_dir("out"), &locator).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.trim_end(), "Peak,Cluster,Value,x,y,z");
}

fn report_inputs(fx: &Fixture, table: &str) -> ReportInputs {
    let template = fx.template();
    let var = fx.volume4("varcope1_merged.nii.gz", &varcopes(4));
    let mask_file = make_group_mask(&var, &template, fx.dir.path()).unwrap();
    let zstat = two_blobs() - 1.0;
    let thresh = two_blobs().mapv(|v| if v > 2.3 { v } else { 0.0 });
    let copes = Array4::from_shape_fn((GRID.0, GRID.1, GRID.2, 4), |(x, _, _, s)| {
        if x < 13 {
            1.0 + s as f64
        } else {
            -(s as f64)
        }
    });
    let zstat_thresh_file = fx.volume3("zstat1_thresh.nii.gz", &thresh);
    let localmax_file = fx.text("zstat1_localmax.txt", table);
    let seg = watershed_segment(&zstat_thresh_file, &localmax_file, fx.dir.path()).unwrap();

    ReportInputs {
        mask_file,
        zstat_file: fx.volume3("zstat1.nii.gz", &zstat),
        zstat_thresh_file,
        cope_file: fx.volume4("cope1_merged.nii.gz", &copes),
        seg_file: seg.seg_file,
        localmax_file,
        subjects: (1..=4).map(|i| format!("subj{:02}", i)).collect(),
    }
}

fn config_for(inputs: &ReportInputs) -> GroupConfig {
    GroupConfig {
        anatomy: Some(inputs.mask_file.clone()),
        ..Default::default()
    }
}

fn file_names(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn sizes(files: &[PathBuf]) -> Vec<u64> {
    files
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().len())
        .collect()
}

#[test]
fn test_report_manifest_is_stable_across_peak_states() {
    let with_peaks = Fixture::new();
    let inputs = report_inputs(
        &with_peaks,
        &format!("{}2\t8.1\t5\t5\t5\t\n1\t5.3\t20\t20\t20\t\n", TABLE_HEADER),
    );
    let out_a = with_peaks.out_dir("report");
    let full = generate_report(&inputs, &out_a, &config_for(&inputs)).unwrap();

    let without = Fixture::new();
    let inputs = report_inputs(&without, TABLE_HEADER);
    let out_b = without.out_dir("report");
    let empty = generate_report(&inputs, &out_b, &config_for(&inputs)).unwrap();

    let expected = vec![
        "subjects.txt",
        "group_mask.png",
        "zstat1.png",
        "zstat1_thresh.png",
        "zstat1_thresh_seg.png",
        "zstat1_thresh_peaks.png",
        "peak_boxplot.png",
    ];
    assert_eq!(file_names(&full.files), expected);
    assert_eq!(file_names(&empty.files), expected);
    assert!(full.files.iter().all(|p| p.starts_with(&out_a)));

    assert_eq!(full.state, PeakState::HasPeaks(2));
    assert!(sizes(&full.files).iter().all(|&s| s > 0));

    assert_eq!(empty.state, PeakState::NoPeaks);
    let empty_sizes = sizes(&empty.files);
    assert!(empty_sizes[..4].iter().all(|&s| s > 0));
    assert_eq!(&empty_sizes[4..], &[0, 0, 0]);
}

#[test]
fn test_report_is_repeatable() {
    let fx = Fixture::new();
    let inputs = report_inputs(
        &fx,
        &format!("{}2\t8.1\t5\t5\t5\t\n1\t5.3\t20\t20\t20\t\n", TABLE_HEADER),
    );
    let first = generate_report(&inputs, &fx.out_dir("first"), &config_for(&inputs)).unwrap();
    let second = generate_report(&inputs, &fx.out_dir("second"), &config_for(&inputs)).unwrap();

    // mosaics and the subject list carry no timestamps
    for (a, b) in first.files.iter().zip(&second.files).take(6) {
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap(), "{:?}", a);
    }
}

#[test]
fn test_report_missing_cope_stack_fails() {
    let fx = Fixture::new();
    let mut inputs = report_inputs(
        &fx,
        &format!("{}2\t8.1\t5\t5\t5\t\n", TABLE_HEADER),
    );
    inputs.cope_file = Path::new("/nonexistent/cope1_merged.nii.gz").to_path_buf();
    assert!(generate_report(&inputs, &fx.out_dir("out"), &config_for(&inputs)).is_err());
}
