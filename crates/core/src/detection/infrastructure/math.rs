//! Box geometry shared by the YOLO decoders and the tracker.

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Greedy NMS over `(bbox, score, class)` triples.
///
/// Boxes are visited in descending score order; a box is suppressed when it
/// overlaps an already-kept box of the same class by more than `iou_thresh`.
/// Returns the indices of the kept boxes, highest score first.
pub fn nms(boxes: &[([f64; 4], f64, u32)], iou_thresh: f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| {
        boxes[b]
            .1
            .partial_cmp(&boxes[a].1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<usize> = Vec::new();
    for i in order {
        let (bbox, _, class) = &boxes[i];
        let suppressed = keep.iter().any(|&k| {
            let (kept_box, _, kept_class) = &boxes[k];
            kept_class == class && bbox_iou(kept_box, bbox) > iou_thresh
        });
        if !suppressed {
            keep.push(i);
        }
    }
    keep
}
