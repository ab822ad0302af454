mod tracking_concurrency;
